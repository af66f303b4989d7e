use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::record::DataSource;
use crate::resources::{self, ResourceSchema};
use crate::table::{EqualityFilter, Predicates, SortDirection, SortSpec};
use rusqlite::Connection;
use serde_json::{json, Value};

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_schema(params: &Value) -> Result<&'static ResourceSchema, HandlerErr> {
    let collection = get_required_str(params, "collection")?;
    resources::lookup(&collection).ok_or_else(|| {
        HandlerErr::new("unknown_collection", format!("unknown collection: {}", collection))
            .with_details(json!({ "collection": collection }))
    })
}

pub fn get_object(params: &Value, key: &str) -> Result<serde_json::Map<String, Value>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(serde_json::Map::new()),
        Some(Value::Object(m)) => Ok(m.clone()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an object", key))),
    }
}

fn get_usize(params: &Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("{} must be a non-negative integer", key))
            }),
    }
}

/// Table request decoded from params: predicates, optional sort, page.
pub struct TableRequest {
    pub predicates: Predicates,
    pub sort: Option<SortSpec>,
    pub page_index: usize,
    pub page_size: Option<usize>,
}

/// `filters` is `{field: value}`; only the resource's filter fields are accepted.
pub fn parse_table_request(
    params: &Value,
    schema: &ResourceSchema,
    default_direction: SortDirection,
) -> Result<TableRequest, HandlerErr> {
    let search_text = match params.get("searchText") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(HandlerErr::bad_params("searchText must be a string")),
    };

    let mut filters = Vec::new();
    for (field, value) in get_object(params, "filters")? {
        if !schema.filter_fields.contains(&field.as_str()) {
            return Err(HandlerErr::bad_params(format!(
                "cannot filter {} by {}",
                schema.collection, field
            )));
        }
        let Some(value) = crate::record::value_text(&value) else {
            continue;
        };
        filters.push(EqualityFilter::new(field, value));
    }

    let data_source = match params.get("dataSource").and_then(|v| v.as_str()) {
        None => None,
        Some(s) if s.eq_ignore_ascii_case(crate::table::ALL) => None,
        Some(s) => Some(
            DataSource::parse(s)
                .ok_or_else(|| HandlerErr::bad_params("dataSource must be offline, lms or all"))?,
        ),
    };

    let sort = match params.get("sort") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let key = get_required_str(v, "key")?;
            let direction = match v.get("direction").and_then(|d| d.as_str()) {
                None => default_direction,
                Some(d) => SortDirection::parse(d)
                    .ok_or_else(|| HandlerErr::bad_params("sort.direction must be asc or desc"))?,
            };
            Some(SortSpec { key, direction })
        }
    };

    Ok(TableRequest {
        predicates: Predicates {
            search_text,
            search_fields: schema.search_fields.iter().map(|f| f.to_string()).collect(),
            filters,
            data_source,
        },
        sort,
        page_index: get_usize(params, "pageIndex")?.unwrap_or(0),
        page_size: get_usize(params, "pageSize")?,
    })
}

pub fn write_text_file(path: &std::path::Path, contents: &str) -> Result<(), HandlerErr> {
    let details = Some(json!({ "path": path.to_string_lossy() }));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HandlerErr {
            code: "export_failed",
            message: e.to_string(),
            details: details.clone(),
        })?;
    }
    std::fs::write(path, contents).map_err(|e| HandlerErr {
        code: "export_failed",
        message: e.to_string(),
        details,
    })
}
