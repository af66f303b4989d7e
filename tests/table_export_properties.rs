use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use trainingd::export::{self, Column};
use trainingd::join::{self, ForeignKey};
use trainingd::record::{DataSource, Record};
use trainingd::table::{self, Predicates, SortDirection, SortSpec};

fn learner(id: &str, first: &str, dept: Option<&str>, source: DataSource) -> Record {
    let r = Record::new(id, source, Utc::now()).with_field("first_name", first);
    match dept {
        Some(d) => r.with_field("department", d),
        None => r.with_field("department", Value::Null),
    }
}

fn fixture() -> Vec<Record> {
    vec![
        learner("l1", "Ana", Some("Health, Safety"), DataSource::Offline),
        learner("l2", "ben", Some("Ops"), DataSource::Lms),
        learner("l3", "Cleo", None, DataSource::Offline),
        learner("l4", "Dirk \"DJ\"", Some("Ops"), DataSource::Lms),
        learner("l5", "eva", Some("Sales"), DataSource::Offline),
    ]
}

fn predicate_grid() -> Vec<Predicates> {
    let mut out = Vec::new();
    for text in ["", "a", "OPS", "zzz"] {
        for dept in ["all", "Ops", "Sales"] {
            for ds in [None, Some(DataSource::Lms)] {
                let mut p = Predicates::search(&["first_name", "department"], text)
                    .with_filter("department", dept);
                p.data_source = ds;
                out.push(p);
            }
        }
    }
    out
}

#[test]
fn view_is_a_subset_in_input_order_and_idempotent() {
    let rows = fixture();
    for p in predicate_grid() {
        let once = table::view(&rows, &p, None);
        assert!(once.iter().all(|r| rows.contains(r)), "{:?}", p);
        let positions: Vec<usize> = once
            .iter()
            .map(|r| rows.iter().position(|x| x.id == r.id).expect("present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", p);
        assert_eq!(table::view(&once, &p, None), once, "{:?}", p);
    }
}

#[test]
fn sorted_pages_partition_the_view() {
    let rows = fixture();
    let sort = SortSpec {
        key: "first_name".into(),
        direction: SortDirection::Asc,
    };
    let visible = table::view(&rows, &Predicates::default(), Some(&sort));
    let names: Vec<String> = visible
        .iter()
        .filter_map(|r| r.text("first_name"))
        .collect();
    assert_eq!(names, vec!["Ana", "ben", "Cleo", "Dirk \"DJ\"", "eva"]);

    for size in 1..=6 {
        let count = table::paginate(&visible, 0, size).page_count;
        let joined: Vec<Record> = (0..count)
            .flat_map(|i| table::paginate(&visible, i, size).items)
            .collect();
        assert_eq!(joined, visible, "page size {}", size);
    }
}

#[test]
fn exported_text_parses_back_to_labels_and_values() {
    let rows = fixture();
    let columns = [
        Column::new("id", "Id"),
        Column::new("first_name", "First name"),
        Column::new("department", "Department"),
    ];
    for delimiter in [b',', b';', b'\t'] {
        let text = export::to_delimited_text(&rows, &columns, delimiter).expect("export");
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(text.as_bytes());
        let headers = rdr.headers().expect("headers").clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["Id", "First name", "Department"]
        );
        let parsed: Vec<csv::StringRecord> = rdr.records().map(|r| r.expect("row")).collect();
        assert_eq!(parsed.len(), rows.len());
        for (rec, row) in rows.iter().zip(&parsed) {
            for (i, col) in columns.iter().enumerate() {
                assert_eq!(
                    row.get(i).unwrap_or_default(),
                    rec.text(&col.key).unwrap_or_default()
                );
            }
        }
    }

    let two = &rows[..2];
    let text = export::to_delimited_text(two, &columns, b',').expect("export");
    assert!(text.lines().any(|l| l.contains("\"Health, Safety\"")));
}

#[test]
fn joined_columns_export_and_misses_render_empty() {
    let sessions = vec![
        Record::new("s1", DataSource::Offline, Utc::now()).with_field("course_id", "c1"),
        Record::new("s2", DataSource::Offline, Utc::now()).with_field("course_id", "gone"),
    ];
    let mut secondary = HashMap::new();
    secondary.insert(
        "courses".to_string(),
        vec![Record::new("c1", DataSource::Lms, Utc::now()).with_field("name", "Safety 101")],
    );
    let joined = join::attach(
        sessions,
        &secondary,
        &[ForeignKey::new("course_id", "courses", "course")],
    );
    let text = export::to_delimited_text(
        &joined,
        &[Column::new("id", "Session"), Column::new("course.name", "Course")],
        b',',
    )
    .expect("export");
    assert_eq!(text, "Session,Course\ns1,Safety 101\ns2,\n");
}
