use crate::record::{DataSource, Record};
use serde_json::Value;
use std::cmp::Ordering;

/// Filter value that matches every record.
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFilter {
    pub field: String,
    pub value: String,
}

impl EqualityFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn is_wildcard(&self) -> bool {
        self.value.eq_ignore_ascii_case(ALL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicates {
    pub search_text: Option<String>,
    pub search_fields: Vec<String>,
    pub filters: Vec<EqualityFilter>,
    /// `None` keeps both offline and synchronized rows.
    pub data_source: Option<DataSource>,
}

impl Predicates {
    pub fn search(fields: &[&str], text: &str) -> Self {
        Self {
            search_text: Some(text.to_string()),
            search_fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push(EqualityFilter::new(field, value));
        self
    }

    fn needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, rec: &Record) -> bool {
        if let Some(needle) = self.needle() {
            let hit = self.search_fields.iter().any(|f| {
                rec.text(f)
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
            if !hit {
                return false;
            }
        }
        for f in self.filters.iter().filter(|f| !f.is_wildcard()) {
            if rec.text(&f.field).as_deref() != Some(f.value.as_str()) {
                return false;
            }
        }
        if let Some(ds) = self.data_source {
            if rec.data_source != ds {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

/// Visible subset of `records`, in input order unless a sort is given.
pub fn view(records: &[Record], predicates: &Predicates, sort: Option<&SortSpec>) -> Vec<Record> {
    let mut out: Vec<Record> = records
        .iter()
        .filter(|r| predicates.matches(r))
        .cloned()
        .collect();
    if let Some(spec) = sort {
        sort_records(&mut out, spec);
    }
    out
}

/// Stable sort; missing values go last in either direction.
pub fn sort_records(records: &mut [Record], spec: &SortSpec) {
    records.sort_by(|a, b| {
        match (a.lookup(&spec.key), b.lookup(&spec.key)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(&x, &y);
                match spec.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    });
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    let x = crate::record::value_text(a).unwrap_or_default().to_lowercase();
    let y = crate::record::value_text(b).unwrap_or_default().to_lowercase();
    x.cmp(&y)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_index: usize,
    pub page_size: usize,
    pub total: usize,
    pub page_count: usize,
}

/// Pure slice of `items`. Page size 0 is read as 1; an index past the end is empty.
pub fn paginate<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let page_count = total.div_ceil(page_size);
    let start = page_index.saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);
    Page {
        items: items[start..end].to_vec(),
        page_index,
        page_size,
        total,
        page_count,
    }
}

/// Predicate, sort and page state of one screen. Every predicate or sort
/// change sends the user back to the first page.
#[derive(Debug, Clone)]
pub struct TableState {
    predicates: Predicates,
    sort: Option<SortSpec>,
    page_index: usize,
    page_size: usize,
}

impl TableState {
    pub fn new(search_fields: &[&str], page_size: usize) -> Self {
        Self {
            predicates: Predicates {
                search_fields: search_fields.iter().map(|f| f.to_string()).collect(),
                ..Predicates::default()
            },
            sort: None,
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn predicates(&self) -> &Predicates {
        &self.predicates
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn set_search(&mut self, text: &str) {
        self.predicates.search_text = Some(text.to_string());
        self.page_index = 0;
    }

    /// Replaces the filter on `field`; `all` clears it.
    pub fn set_filter(&mut self, field: &str, value: &str) {
        self.predicates.filters.retain(|f| f.field != field);
        if !value.eq_ignore_ascii_case(ALL) {
            self.predicates.filters.push(EqualityFilter::new(field, value));
        }
        self.page_index = 0;
    }

    pub fn set_data_source(&mut self, ds: Option<DataSource>) {
        self.predicates.data_source = ds;
        self.page_index = 0;
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.page_index = 0;
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = size.max(1);
        self.page_index = 0;
    }

    pub fn go_to_page(&mut self, index: usize) {
        self.page_index = index;
    }

    pub fn render(&self, records: &[Record]) -> Page<Record> {
        let visible = view(records, &self.predicates, self.sort.as_ref());
        paginate(&visible, self.page_index, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn course(id: &str, name: &str, status: &str) -> Record {
        Record::new(id, DataSource::Offline, Utc::now())
            .with_field("name", name)
            .with_field("status", status)
    }

    fn ids(rs: &[Record]) -> Vec<&str> {
        rs.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn safety_course_scenario() {
        let courses = vec![course("c1", "Safety 101", "active")];
        let by_text = view(&courses, &Predicates::search(&["name"], "safety"), None);
        assert_eq!(ids(&by_text), vec!["c1"]);

        let by_status = view(
            &courses,
            &Predicates::default().with_filter("status", "archived"),
            None,
        );
        assert!(by_status.is_empty());
    }

    #[test]
    fn search_is_or_across_fields_and_filters_are_and() {
        let rows = vec![
            course("c1", "Forklift", "active").with_field("code", "SAFE-1"),
            course("c2", "Safety 101", "draft"),
            course("c3", "First aid", "active"),
        ];
        let p = Predicates::search(&["name", "code"], "SAFE");
        assert_eq!(ids(&view(&rows, &p, None)), vec!["c1", "c2"]);

        let p = p.with_filter("status", "active").with_filter("name", "all");
        assert_eq!(ids(&view(&rows, &p, None)), vec!["c1"]);
    }

    #[test]
    fn missing_and_null_fields_never_match() {
        let rows = vec![
            Record::new("x", DataSource::Lms, Utc::now()).with_field("name", Value::Null),
            Record::new("y", DataSource::Lms, Utc::now()),
        ];
        let p = Predicates::search(&["name", "code"], "a").with_filter("status", "active");
        assert!(view(&rows, &p, None).is_empty());
        let p = Predicates::default().with_filter("status", "active");
        assert!(view(&rows, &p, None).is_empty());
    }

    #[test]
    fn identity_and_idempotence() {
        let rows = vec![
            course("c3", "b", "active"),
            course("c1", "a", "draft"),
            course("c2", "c", "active"),
        ];
        let identity = Predicates {
            search_text: Some("  ".into()),
            search_fields: vec!["name".into()],
            filters: vec![EqualityFilter::new("status", "all")],
            data_source: None,
        };
        assert_eq!(view(&rows, &identity, None), rows);

        let p = Predicates::default().with_filter("status", "active");
        let once = view(&rows, &p, None);
        assert_eq!(view(&once, &p, None), once);
        assert!(once.iter().all(|r| rows.contains(r)));
    }

    #[test]
    fn sort_numeric_desc_with_missing_last_and_stable_ties() {
        let rows = vec![
            course("a", "x", "s").with_field("price", 10),
            course("b", "x", "s"),
            course("c", "x", "s").with_field("price", 200),
            course("d", "x", "s").with_field("price", 10),
        ];
        let spec = SortSpec {
            key: "price".into(),
            direction: SortDirection::Desc,
        };
        let sorted = view(&rows, &Predicates::default(), Some(&spec));
        assert_eq!(ids(&sorted), vec!["c", "a", "d", "b"]);

        let spec = SortSpec {
            key: "price".into(),
            direction: SortDirection::Asc,
        };
        let sorted = view(&rows, &Predicates::default(), Some(&spec));
        assert_eq!(ids(&sorted), vec!["a", "d", "c", "b"]);
    }

    #[test]
    fn pages_partition_the_list() {
        let items: Vec<u32> = (0..23).collect();
        for size in [1usize, 5, 10, 23, 40] {
            let first = paginate(&items, 0, size);
            let mut joined = Vec::new();
            for i in 0..first.page_count {
                joined.extend(paginate(&items, i, size).items);
            }
            assert_eq!(joined, items, "page size {}", size);
        }
        assert!(paginate(&items, 99, 10).items.is_empty());
        assert_eq!(paginate(&items, 0, 0).page_size, 1);
        assert_eq!(paginate::<u32>(&[], 0, 10).page_count, 0);
    }

    #[test]
    fn predicate_changes_reset_page() {
        let rows: Vec<Record> = (0..30)
            .map(|i| course(&format!("c{}", i), "n", if i % 2 == 0 { "active" } else { "draft" }))
            .collect();
        let mut state = TableState::new(&["name"], 10);
        state.go_to_page(2);
        assert_eq!(state.render(&rows).items.len(), 10);

        state.set_filter("status", "active");
        assert_eq!(state.page_index(), 0);
        assert_eq!(state.render(&rows).total, 15);

        state.go_to_page(1);
        state.set_search("n");
        assert_eq!(state.page_index(), 0);
        state.go_to_page(1);
        state.set_data_source(Some(DataSource::Lms));
        assert_eq!(state.page_index(), 0);
        assert_eq!(state.render(&rows).total, 0);

        state.set_filter("status", "all");
        assert!(state.predicates().filters.is_empty());
    }
}
