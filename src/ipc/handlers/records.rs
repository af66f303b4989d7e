use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    get_object, get_required_str, get_schema, parse_table_request, require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::modal::{CrudError, CrudModal, PendingDelete};
use crate::record::Record;
use crate::resources::ResourceSchema;
use crate::screen::{self, SectionFailure};
use crate::store::{CollectionClient, Query, SqliteCollections};
use crate::table;
use crate::tenant::TenantContext;
use chrono::Utc;
use serde_json::{json, Value};

pub(crate) fn require_tenant<'s>(
    state: &'s AppState,
    schema: &ResourceSchema,
) -> Result<Option<&'s TenantContext>, HandlerErr> {
    match (&state.tenant, schema.tenant_scoped) {
        (None, true) => Err(HandlerErr::new(
            "no_tenant",
            format!("{} records belong to an organization; select one first", schema.label),
        )),
        (t, _) => Ok(t.as_ref()),
    }
}

pub(crate) fn failures_json(failed: &[SectionFailure]) -> Value {
    json!(failed
        .iter()
        .map(|f| json!({ "collection": f.collection, "message": f.message }))
        .collect::<Vec<_>>())
}

fn crud_err(schema: &ResourceSchema, modal: &CrudModal, e: CrudError) -> HandlerErr {
    log::warn!("{} write rejected: {}", schema.collection, e);
    HandlerErr {
        code: e.code(),
        message: modal
            .error()
            .map(|s| s.to_string())
            .unwrap_or_else(|| e.to_string()),
        details: Some(json!({ "collection": schema.collection })),
    }
}

/// Existing row by id, limited to the tenant for scoped collections.
fn find_existing(
    client: &dyn CollectionClient,
    schema: &ResourceSchema,
    tenant: Option<&TenantContext>,
    id: &str,
) -> Result<Record, HandlerErr> {
    let mut q = Query::all().eq("id", id);
    if let (true, Some(t)) = (schema.tenant_scoped, tenant) {
        q = q.eq("organization_id", &t.organization_id);
    }
    client
        .select(schema.collection, &q)?
        .into_iter()
        .next()
        .ok_or_else(|| HandlerErr::new("not_found", format!("{} not found", schema.label)))
}

fn records_list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let settings =
        setup::table_settings(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let request = parse_table_request(params, schema, settings.sort_direction)?;

    let client = SqliteCollections::new(conn);
    let data = screen::load_screen(&client, schema, tenant)?;
    let visible = table::view(&data.rows, &request.predicates, request.sort.as_ref());
    let page = table::paginate(
        &visible,
        request.page_index,
        request.page_size.unwrap_or(settings.page_size),
    );

    let empty = data.is_empty();
    Ok(json!({
        "rows": page.items.iter().map(Record::to_json).collect::<Vec<_>>(),
        "total": page.total,
        "pageIndex": page.page_index,
        "pageSize": page.page_size,
        "pageCount": page.page_count,
        "empty": empty,
        "emptyMessage": if empty { Some(schema.empty_message) } else { None },
        "noMatches": !empty && page.total == 0,
        "failedSections": failures_json(&data.failed_sections),
    }))
}

fn records_get(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let id = get_required_str(params, "id")?;

    let client = SqliteCollections::new(conn);
    let Some((record, failed)) = screen::load_one(&client, schema, tenant, &id)? else {
        return Err(HandlerErr::new("not_found", format!("{} not found", schema.label)));
    };
    Ok(json!({
        "record": record.to_json(),
        "failedSections": failures_json(&failed),
    }))
}

fn records_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;

    let mut modal = CrudModal::open_create(schema, get_object(params, "defaults")?);
    modal.set_draft(get_object(params, "draft")?);

    let client = SqliteCollections::new(conn);
    let record = modal
        .submit(&client, tenant, &state.ids, Utc::now())
        .map_err(|e| crud_err(schema, &modal, e))?;
    log::info!("created {} {}", schema.collection, record.id);
    Ok(json!({ "record": record.to_json() }))
}

fn records_update(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let id = get_required_str(params, "id")?;

    let client = SqliteCollections::new(conn);
    let existing = find_existing(&client, schema, tenant, &id)?;
    let mut modal = CrudModal::open_edit(schema, &existing);
    modal.set_draft(get_object(params, "draft")?);

    let record = modal
        .submit(&client, tenant, &state.ids, Utc::now())
        .map_err(|e| crud_err(schema, &modal, e))?;
    log::info!("updated {} {}", schema.collection, record.id);
    Ok(json!({ "record": record.to_json() }))
}

fn records_delete(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let schema = get_schema(params)?;
    let tenant = require_tenant(state, schema)?;
    let id = get_required_str(params, "id")?;
    let confirmed = params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let client = SqliteCollections::new(conn);
    find_existing(&client, schema, tenant, &id)?;

    let pending = PendingDelete::new(schema, id.as_str());
    let must_confirm = setup::confirm_deletes(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if must_confirm && !confirmed {
        return Err(HandlerErr::new("confirmation_required", pending.prompt())
            .with_details(json!({ "collection": schema.collection, "id": id })));
    }
    pending.confirm(&client).map_err(|e| HandlerErr {
        code: if e.code() == "not_found" { "not_found" } else { "db_delete_failed" },
        message: e.to_string(),
        details: Some(json!({ "collection": schema.collection })),
    })?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.list" => records_list(state, &req.params),
        "records.get" => records_get(state, &req.params),
        "records.create" => records_create(state, &req.params),
        "records.update" => records_update(state, &req.params),
        "records.delete" => records_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
