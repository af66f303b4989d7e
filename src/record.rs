use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Loose attribute bag holding a resource's own fields.
pub type FieldMap = Map<String, Value>;

/// Keys owned by the record envelope. Drafts may never set these.
pub const RESERVED_KEYS: &[&str] = &[
    "id",
    "data_source",
    "organization_id",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Offline,
    Lms,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Lms => "lms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Some(Self::Offline),
            "lms" => Some(Self::Lms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub data_source: DataSource,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub fields: FieldMap,
    /// Rows attached by the join resolver, keyed by the relation's `as` name.
    pub related: BTreeMap<String, Record>,
}

impl Record {
    pub fn new(id: impl Into<String>, data_source: DataSource, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            data_source,
            organization_id: None,
            created_at,
            updated_at: None,
            fields: FieldMap::new(),
            related: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Resolves a field by name. Envelope keys are answered from the envelope,
    /// dotted paths (`course.name`) walk through related records.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if let Some((head, rest)) = path.split_once('.') {
            return self.related.get(head).and_then(|r| r.lookup(rest));
        }
        match path {
            "id" => Some(Value::String(self.id.clone())),
            "data_source" => Some(Value::String(self.data_source.as_str().to_string())),
            "organization_id" => self.organization_id.clone().map(Value::String),
            "created_at" => Some(Value::String(format_ts(&self.created_at))),
            "updated_at" => self.updated_at.as_ref().map(|t| Value::String(format_ts(t))),
            _ => match self.fields.get(path) {
                Some(Value::Null) | None => None,
                Some(v) => Some(v.clone()),
            },
        }
    }

    /// Text form of a field for search, equality filters and export.
    /// Missing and null fields have no text.
    pub fn text(&self, path: &str) -> Option<String> {
        self.lookup(path).and_then(|v| value_text(&v))
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (k, v) in &self.fields {
            out.insert(k.clone(), v.clone());
        }
        out.insert("id".into(), json!(self.id));
        out.insert("data_source".into(), json!(self.data_source.as_str()));
        out.insert("organization_id".into(), json!(self.organization_id));
        out.insert("created_at".into(), json!(format_ts(&self.created_at)));
        out.insert(
            "updated_at".into(),
            json!(self.updated_at.as_ref().map(format_ts)),
        );
        for (name, rel) in &self.related {
            out.insert(name.clone(), rel.to_json());
        }
        Value::Object(out)
    }
}

pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn format_ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
