use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::resources;
use crate::tenant::TenantContext;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "organizationId": state.tenant.as_ref().map(|t| t.organization_id.clone())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            log::info!("workspace opened: {}", path.to_string_lossy());
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            log::warn!("workspace open failed: {:?}", e);
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

/// Binds later reads and writes to one organization. Passing `null` clears it.
fn handle_tenant_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    match req.params.get("organizationId") {
        Some(serde_json::Value::Null) => {
            state.tenant = None;
            return ok(&req.id, json!({ "organizationId": null }));
        }
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
            let mut tenant = TenantContext::new(s.trim());
            tenant.user_id = req
                .params
                .get("userId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            log::info!("tenant selected: {}", tenant.organization_id);
            let org = tenant.organization_id.clone();
            state.tenant = Some(tenant);
            ok(&req.id, json!({ "organizationId": org }))
        }
        _ => err(&req.id, "bad_params", "missing organizationId", None),
    }
}

fn handle_resources_list(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let list: Vec<serde_json::Value> = resources::ALL.iter().map(|s| s.describe()).collect();
    ok(&req.id, json!({ "resources": list }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "tenant.select" => Some(handle_tenant_select(state, req)),
        "resources.list" => Some(handle_resources_list(state, req)),
        _ => None,
    }
}
