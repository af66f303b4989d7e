use crate::record::{format_ts, parse_ts, DataSource, FieldMap, Record};
use crate::resources;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("invalid field name: {0}")]
    BadField(String),
    #[error("{collection} {id} not found")]
    NotFound { collection: String, id: String },
    #[error("{collection} {id} already exists")]
    Conflict { collection: String, id: String },
    #[error("stored row {id} is malformed: {reason}")]
    Corrupt { id: String, reason: String },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// IPC error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCollection(_) => "unknown_collection",
            Self::BadField(_) => "bad_params",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Corrupt { .. } | Self::Db(_) | Self::Json(_) => "db_query_failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub eq: Vec<(String, String)>,
    /// Field and ascending flag.
    pub order: Option<(String, bool)>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.eq.push((field.to_string(), value.to_string()));
        self
    }

    pub fn order(mut self, field: &str, ascending: bool) -> Self {
        self.order = Some((field.to_string(), ascending));
        self
    }
}

/// Named-collection access in the shape of a hosted table client.
pub trait CollectionClient {
    fn select(&self, collection: &str, query: &Query) -> Result<Vec<Record>, StoreError>;
    fn insert(&self, collection: &str, record: &Record) -> Result<Record, StoreError>;
    /// Merges `patch` into the stored fields. The envelope is never touched
    /// apart from `updated_at`.
    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &FieldMap,
        updated_at: DateTime<Utc>,
    ) -> Result<Record, StoreError>;
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

const BASE_COLUMNS: &[&str] = &[
    "id",
    "organization_id",
    "data_source",
    "created_at",
    "updated_at",
];

pub struct SqliteCollections<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCollections<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn table(&self, collection: &str) -> Result<&'static str, StoreError> {
        resources::lookup(collection)
            .map(|s| s.collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT id, organization_id, data_source, created_at, updated_at, fields
             FROM {} WHERE id = ?",
            table
        );
        let raw = self
            .conn
            .query_row(&sql, [id], read_raw)
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }
}

/// Column expression for a field name. Resource fields live inside the JSON blob.
fn column_expr(field: &str) -> Result<String, StoreError> {
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::BadField(field.to_string()));
    }
    if BASE_COLUMNS.contains(&field) {
        Ok(field.to_string())
    } else {
        Ok(format!("json_extract(fields, '$.{}')", field))
    }
}

struct RawRow {
    id: String,
    organization_id: Option<String>,
    data_source: String,
    created_at: String,
    updated_at: Option<String>,
    fields: String,
}

fn read_raw(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: r.get(0)?,
        organization_id: r.get(1)?,
        data_source: r.get(2)?,
        created_at: r.get(3)?,
        updated_at: r.get(4)?,
        fields: r.get(5)?,
    })
}

impl RawRow {
    fn into_record(self) -> Result<Record, StoreError> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let data_source =
            DataSource::parse(&self.data_source).ok_or_else(|| corrupt("data_source"))?;
        let created_at = parse_ts(&self.created_at).ok_or_else(|| corrupt("created_at"))?;
        let updated_at = match self.updated_at.as_deref() {
            Some(s) => Some(parse_ts(s).ok_or_else(|| corrupt("updated_at"))?),
            None => None,
        };
        let fields: FieldMap = match serde_json::from_str::<Value>(&self.fields)? {
            Value::Object(m) => m,
            _ => return Err(corrupt("fields")),
        };
        Ok(Record {
            id: self.id,
            data_source,
            organization_id: self.organization_id,
            created_at,
            updated_at,
            fields,
            related: Default::default(),
        })
    }
}

impl CollectionClient for SqliteCollections<'_> {
    fn select(&self, collection: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let table = self.table(collection)?;
        let mut sql = format!(
            "SELECT id, organization_id, data_source, created_at, updated_at, fields FROM {}",
            table
        );
        let mut params: Vec<String> = Vec::new();
        for (i, (field, value)) in query.eq.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("CAST({} AS TEXT) = ?", column_expr(field)?));
            params.push(value.clone());
        }
        match &query.order {
            Some((field, asc)) => sql.push_str(&format!(
                " ORDER BY {} {}, rowid",
                column_expr(field)?,
                if *asc { "ASC" } else { "DESC" }
            )),
            None => sql.push_str(" ORDER BY rowid"),
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(params.iter()), read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("select {} -> {} rows", table, raws.len());
        raws.into_iter().map(RawRow::into_record).collect()
    }

    fn insert(&self, collection: &str, record: &Record) -> Result<Record, StoreError> {
        let table = self.table(collection)?;
        if self.get(table, &record.id)?.is_some() {
            return Err(StoreError::Conflict {
                collection: table.to_string(),
                id: record.id.clone(),
            });
        }
        let sql = format!(
            "INSERT INTO {}(id, organization_id, data_source, created_at, updated_at, fields)
             VALUES(?, ?, ?, ?, ?, ?)",
            table
        );
        self.conn.execute(
            &sql,
            params![
                record.id,
                record.organization_id,
                record.data_source.as_str(),
                format_ts(&record.created_at),
                record.updated_at.as_ref().map(format_ts),
                serde_json::to_string(&record.fields)?,
            ],
        )?;
        let mut stored = record.clone();
        stored.related.clear();
        Ok(stored)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &FieldMap,
        updated_at: DateTime<Utc>,
    ) -> Result<Record, StoreError> {
        let table = self.table(collection)?;
        let Some(mut current) = self.get(table, id)? else {
            return Err(StoreError::NotFound {
                collection: table.to_string(),
                id: id.to_string(),
            });
        };
        for (k, v) in patch {
            current.fields.insert(k.clone(), v.clone());
        }
        current.updated_at = Some(updated_at);
        let sql = format!("UPDATE {} SET fields = ?, updated_at = ? WHERE id = ?", table);
        self.conn.execute(
            &sql,
            params![serde_json::to_string(&current.fields)?, format_ts(&updated_at), id],
        )?;
        Ok(current)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let table = self.table(collection)?;
        let sql = format!("DELETE FROM {} WHERE id = ?", table);
        let n = self.conn.execute(&sql, [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                collection: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
