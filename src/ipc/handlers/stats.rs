use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records::{failures_json, require_tenant};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_schema, parse_table_request, require_db};
use crate::ipc::types::{AppState, Request};
use crate::resources::ATTENDANCE;
use crate::screen;
use crate::stats;
use crate::store::SqliteCollections;
use crate::table::{self, Predicates};
use serde_json::{json, Value};

fn stats_summary(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let settings = setup::table_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let request = parse_table_request(params, schema, settings.sort_direction)?;
    let group_by = params
        .get("groupBy")
        .and_then(|v| v.as_str())
        .unwrap_or(schema.group_by);

    let client = SqliteCollections::new(conn);
    let data = screen::load_screen(&client, schema, tenant)?;
    let visible = table::view(&data.rows, &request.predicates, None);
    let summary = stats::summarize(&visible, group_by);
    Ok(json!({
        "summary": summary,
        "failedSections": failures_json(&data.failed_sections),
    }))
}

fn stats_attendance_rate(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let tenant = require_tenant(state, &ATTENDANCE)?;

    let mut predicates = Predicates::default();
    if let Some(session_id) = params.get("sessionId").and_then(|v| v.as_str()) {
        predicates = predicates.with_filter("session_id", session_id);
    }
    let client = SqliteCollections::new(conn);
    let data = screen::load_screen(&client, &ATTENDANCE, tenant)?;
    let rate = stats::attendance_rate(&table::view(&data.rows, &predicates, None));
    Ok(json!({ "attendance": rate }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stats.summary" => stats_summary(state, &req.params),
        "stats.attendanceRate" => stats_attendance_rate(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
