use crate::ids::PrefixedIds;
use crate::tenant::TenantContext;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub tenant: Option<TenantContext>,
    pub ids: PrefixedIds,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            tenant: None,
            ids: PrefixedIds::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
