use crate::export::{self, Column};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records::{failures_json, require_tenant};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_schema, parse_table_request, require_db, write_text_file};
use crate::ipc::types::{AppState, Request};
use crate::resources::ResourceSchema;
use crate::screen;
use crate::store::SqliteCollections;
use crate::table;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::PathBuf;

/// `columns` overrides the resource's export columns: `[{key, label}]`.
fn parse_columns(params: &Value, schema: &ResourceSchema) -> Result<Vec<Column>, HandlerErr> {
    let Some(raw) = params.get("columns").filter(|v| !v.is_null()) else {
        return Ok(schema.export_columns.to_vec());
    };
    let Some(items) = raw.as_array() else {
        return Err(HandlerErr::bad_params("columns must be an array"));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let key = item.get("key").and_then(|v| v.as_str());
        let label = item.get("label").and_then(|v| v.as_str());
        match (key, label) {
            (Some(k), Some(l)) if !k.trim().is_empty() => {
                out.push(Column::owned(k.trim().to_string(), l.to_string()))
            }
            _ => return Err(HandlerErr::bad_params("each column needs key and label")),
        }
    }
    if out.is_empty() {
        return Err(HandlerErr::bad_params("columns must not be empty"));
    }
    Ok(out)
}

/// Exports the filtered, sorted view (never the raw collection, never one page).
fn records_export(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let table_settings = setup::table_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let export_settings = setup::export_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let request = parse_table_request(params, schema, table_settings.sort_direction)?;
    let columns = parse_columns(params, schema)?;

    let client = SqliteCollections::new(conn);
    let data = screen::load_screen(&client, schema, tenant)?;
    let visible = table::view(&data.rows, &request.predicates, request.sort.as_ref());

    let text = export::to_delimited_text(&visible, &columns, export_settings.delimiter)
        .map_err(|e| HandlerErr::new("export_failed", e.to_string()))?;
    let content = if export_settings.include_bom {
        export::with_bom(&text)
    } else {
        text
    };
    let report = params
        .get("report")
        .and_then(|v| v.as_str())
        .unwrap_or(schema.collection);
    let file_name = export::export_file_name(report, Utc::now().date_naive());

    let path = match params.get("outDir").and_then(|v| v.as_str()) {
        Some(dir) => {
            let p = PathBuf::from(dir).join(&file_name);
            write_text_file(&p, &content)?;
            log::info!(
                "exported {} {} rows to {}",
                schema.collection,
                visible.len(),
                p.to_string_lossy()
            );
            Some(p.to_string_lossy().to_string())
        }
        None => None,
    };

    Ok(json!({
        "fileName": file_name,
        "rowCount": visible.len(),
        "path": path,
        "content": content,
        "failedSections": failures_json(&data.failed_sections),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.export" => Some(respond(&req.id, records_export(state, &req.params))),
        _ => None,
    }
}
