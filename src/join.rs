use crate::record::Record;
use std::collections::HashMap;

/// One soft foreign key: `field` on the primary row holds an id in `collection`,
/// the matching row is attached as `as_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub collection: &'static str,
    pub as_name: &'static str,
}

impl ForeignKey {
    pub const fn new(field: &'static str, collection: &'static str, as_name: &'static str) -> Self {
        Self {
            field,
            collection,
            as_name,
        }
    }
}

/// Attaches related rows to every primary record. A key that matches nothing,
/// or a secondary collection that was never loaded, leaves the relation absent.
/// When the same id appears twice in a secondary collection the first row wins.
pub fn attach(
    mut primary: Vec<Record>,
    secondary: &HashMap<String, Vec<Record>>,
    spec: &[ForeignKey],
) -> Vec<Record> {
    let indexes: Vec<(ForeignKey, HashMap<&str, &Record>)> = spec
        .iter()
        .map(|fk| {
            let mut index = HashMap::new();
            if let Some(rows) = secondary.get(fk.collection) {
                for row in rows {
                    index.entry(row.id.as_str()).or_insert(row);
                }
            }
            (*fk, index)
        })
        .collect();

    for rec in primary.iter_mut() {
        for (fk, index) in &indexes {
            let found = rec
                .text(fk.field)
                .and_then(|key| index.get(key.as_str()).map(|r| (*r).clone()));
            match found {
                Some(row) => {
                    rec.related.insert(fk.as_name.to_string(), row);
                }
                None => {
                    rec.related.remove(fk.as_name);
                }
            }
        }
    }
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataSource;
    use chrono::Utc;

    fn row(id: &str) -> Record {
        Record::new(id, DataSource::Offline, Utc::now())
    }

    #[test]
    fn attaches_matches_and_leaves_misses_absent() {
        let sessions = vec![
            row("s1").with_field("course_id", "c1").with_field("venue_id", "v9"),
            row("s2").with_field("course_id", "c404"),
            row("s3"),
        ];
        let mut secondary = HashMap::new();
        secondary.insert(
            "courses".to_string(),
            vec![
                row("c1").with_field("name", "Safety 101"),
                row("c1").with_field("name", "duplicate"),
            ],
        );
        let spec = [
            ForeignKey::new("course_id", "courses", "course"),
            ForeignKey::new("venue_id", "venues", "venue"),
        ];

        let out = attach(sessions, &secondary, &spec);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text("course.name").as_deref(), Some("Safety 101"));
        assert!(out[0].related.get("venue").is_none());
        assert!(out[1].related.get("course").is_none());
        assert!(out[2].related.is_empty());
        assert_eq!(
            out.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["s1", "s2", "s3"]
        );
    }
}
