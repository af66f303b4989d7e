use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::table::SortDirection;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Table,
    Export,
    Security,
}

const SECTIONS: &[SetupSection] = &[
    SetupSection::Table,
    SetupSection::Export,
    SetupSection::Security,
];

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "export" => Some(Self::Export),
            "security" => Some(Self::Security),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Export => "export",
            Self::Security => "security",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Table => "setup.table",
            Self::Export => "setup.export",
            Self::Security => "setup.security",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Table => json!({
            "defaultPageSize": 25,
            "defaultSortDirection": "asc"
        }),
        SetupSection::Export => json!({
            "includeBom": true,
            "delimiter": ","
        }),
        SetupSection::Security => json!({
            "confirmDeletes": true
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Table => match k.as_str() {
                "defaultPageSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
                }
                "defaultSortDirection" => {
                    let s = v.as_str().ok_or_else(|| format!("{} must be string", k))?;
                    let canonical = match SortDirection::parse(s) {
                        Some(SortDirection::Asc) => "asc",
                        Some(SortDirection::Desc) => "desc",
                        None => return Err("defaultSortDirection must be one of: asc, desc".into()),
                    };
                    obj.insert(k.clone(), Value::String(canonical.to_string()));
                }
                _ => return Err(format!("unknown table field: {}", k)),
            },
            SetupSection::Export => match k.as_str() {
                "includeBom" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "delimiter" => {
                    let s = v.as_str().ok_or_else(|| format!("{} must be string", k))?;
                    if s != "," && s != ";" && s != "\t" {
                        return Err("delimiter must be one of: comma, semicolon, tab".into());
                    }
                    obj.insert(k.clone(), Value::String(s.to_string()));
                }
                _ => return Err(format!("unknown export field: {}", k)),
            },
            SetupSection::Security => match k.as_str() {
                "confirmDeletes" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown security field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed stored values fall back to defaults rather than blocking the screen.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                log::warn!("ignoring stored {} settings: {}", section.name(), e);
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub(crate) struct TableSettings {
    pub page_size: usize,
    pub sort_direction: SortDirection,
}

pub(crate) struct ExportSettings {
    pub include_bom: bool,
    pub delimiter: u8,
}

pub(crate) fn table_settings(conn: &Connection) -> anyhow::Result<TableSettings> {
    let v = load_section(conn, SetupSection::Table)?;
    Ok(TableSettings {
        page_size: v["defaultPageSize"].as_u64().unwrap_or(25) as usize,
        sort_direction: v["defaultSortDirection"]
            .as_str()
            .and_then(SortDirection::parse)
            .unwrap_or(SortDirection::Asc),
    })
}

pub(crate) fn export_settings(conn: &Connection) -> anyhow::Result<ExportSettings> {
    let v = load_section(conn, SetupSection::Export)?;
    Ok(ExportSettings {
        include_bom: v["includeBom"].as_bool().unwrap_or(true),
        delimiter: v["delimiter"]
            .as_str()
            .and_then(|s| s.bytes().next())
            .unwrap_or(b','),
    })
}

pub(crate) fn confirm_deletes(conn: &Connection) -> anyhow::Result<bool> {
    let v = load_section(conn, SetupSection::Security)?;
    Ok(v["confirmDeletes"].as_bool().unwrap_or(true))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SECTIONS {
        match load_section(conn, *section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    log::info!("updated {} settings", section.name());
    ok(&req.id, json!({ "ok": true, "section": section.name(), "values": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
