use crate::join;
use crate::record::Record;
use crate::resources::ResourceSchema;
use crate::store::{CollectionClient, Query, StoreError};
use crate::tenant::TenantContext;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFailure {
    pub collection: String,
    pub message: String,
}

/// Joined rows for one resource screen. Relations whose collection could not be
/// fetched are absent from every row and listed in `failed_sections`.
#[derive(Debug, Clone)]
pub struct ScreenData {
    pub rows: Vec<Record>,
    pub failed_sections: Vec<SectionFailure>,
}

impl ScreenData {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn scoped_query(schema: &ResourceSchema, tenant: Option<&TenantContext>) -> Query {
    let mut q = Query::all();
    if schema.tenant_scoped {
        if let Some(t) = tenant {
            q = q.eq("organization_id", &t.organization_id);
        }
    }
    q
}

/// Fetches the primary collection and every collection its foreign keys point at.
/// Without a tenant, tenant-scoped collections read nothing rather than everything.
pub fn load_screen(
    client: &dyn CollectionClient,
    schema: &'static ResourceSchema,
    tenant: Option<&TenantContext>,
) -> Result<ScreenData, StoreError> {
    if schema.tenant_scoped && tenant.is_none() {
        return Ok(ScreenData {
            rows: Vec::new(),
            failed_sections: Vec::new(),
        });
    }

    let primary = client.select(
        schema.collection,
        &scoped_query(schema, tenant).order("created_at", false),
    )?;

    let mut secondary: HashMap<String, Vec<Record>> = HashMap::new();
    let mut failed_sections = Vec::new();
    for fk in schema.foreign_keys {
        if secondary.contains_key(fk.collection)
            || failed_sections
                .iter()
                .any(|f: &SectionFailure| f.collection == fk.collection)
        {
            continue;
        }
        let target = crate::resources::lookup(fk.collection)
            .ok_or_else(|| StoreError::UnknownCollection(fk.collection.to_string()))?;
        match client.select(fk.collection, &scoped_query(target, tenant)) {
            Ok(rows) => {
                secondary.insert(fk.collection.to_string(), rows);
            }
            Err(e) => {
                log::warn!(
                    "{} screen: could not load {}: {}",
                    schema.collection,
                    fk.collection,
                    e
                );
                failed_sections.push(SectionFailure {
                    collection: fk.collection.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(ScreenData {
        rows: join::attach(primary, &secondary, schema.foreign_keys),
        failed_sections,
    })
}

/// One row with its relations resolved, for detail routes.
pub fn load_one(
    client: &dyn CollectionClient,
    schema: &'static ResourceSchema,
    tenant: Option<&TenantContext>,
    id: &str,
) -> Result<Option<(Record, Vec<SectionFailure>)>, StoreError> {
    let screen = load_screen(client, schema, tenant)?;
    Ok(screen
        .rows
        .into_iter()
        .find(|r| r.id == id)
        .map(|r| (r, screen.failed_sections)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataSource, FieldMap};
    use crate::resources::SESSIONS;
    use chrono::{DateTime, Utc};

    struct FlakyClient {
        broken: &'static str,
    }

    fn row(id: &str, org: &str) -> Record {
        let mut r = Record::new(id, DataSource::Offline, Utc::now());
        r.organization_id = Some(org.to_string());
        r
    }

    impl CollectionClient for FlakyClient {
        fn select(&self, collection: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
            if collection == self.broken {
                return Err(StoreError::UnknownCollection(collection.to_string()));
            }
            let rows = match collection {
                "sessions" => vec![
                    row("s1", "org_a")
                        .with_field("course_id", "c1")
                        .with_field("venue_id", "v1"),
                    row("s2", "org_b").with_field("course_id", "c1"),
                ],
                "courses" => vec![row("c1", "org_a").with_field("name", "Safety 101")],
                "venues" => vec![row("v1", "org_a").with_field("name", "Main hall")],
                _ => Vec::new(),
            };
            let org = query
                .eq
                .iter()
                .find(|(f, _)| f == "organization_id")
                .map(|(_, v)| v.clone());
            Ok(rows
                .into_iter()
                .filter(|r| org.is_none() || r.organization_id == org)
                .collect())
        }

        fn insert(&self, _c: &str, r: &Record) -> Result<Record, StoreError> {
            Ok(r.clone())
        }

        fn update(
            &self,
            c: &str,
            id: &str,
            _p: &FieldMap,
            _t: DateTime<Utc>,
        ) -> Result<Record, StoreError> {
            Err(StoreError::NotFound {
                collection: c.to_string(),
                id: id.to_string(),
            })
        }

        fn delete(&self, _c: &str, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn failed_secondary_renders_partial_rows() {
        let client = FlakyClient { broken: "venues" };
        let tenant = TenantContext::new("org_a");
        let data = load_screen(&client, &SESSIONS, Some(&tenant)).expect("screen");
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0].text("course.name").as_deref(), Some("Safety 101"));
        assert!(data.rows[0].related.get("venue").is_none());
        assert_eq!(data.failed_sections.len(), 1);
        assert_eq!(data.failed_sections[0].collection, "venues");
    }

    #[test]
    fn failed_primary_is_an_error() {
        let client = FlakyClient { broken: "sessions" };
        let tenant = TenantContext::new("org_a");
        assert!(load_screen(&client, &SESSIONS, Some(&tenant)).is_err());
    }

    #[test]
    fn no_tenant_reads_nothing_scoped() {
        let client = FlakyClient { broken: "" };
        let data = load_screen(&client, &SESSIONS, None).expect("screen");
        assert!(data.is_empty());
    }

    #[test]
    fn detail_lookup_by_id() {
        let client = FlakyClient { broken: "" };
        let tenant = TenantContext::new("org_a");
        let (rec, failed) = load_one(&client, &SESSIONS, Some(&tenant), "s1")
            .expect("load")
            .expect("found");
        assert_eq!(rec.text("venue.name").as_deref(), Some("Main hall"));
        assert!(failed.is_empty());
        assert!(load_one(&client, &SESSIONS, Some(&tenant), "s2").expect("load").is_none());
    }
}
