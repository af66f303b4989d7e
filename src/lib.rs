//! Training-management sidecar: a generic filterable table, create/edit modal,
//! foreign-key join and CSV export over tenant-scoped record collections,
//! served to a UI shell as line-delimited JSON.

pub mod db;
pub mod export;
pub mod ids;
pub mod ipc;
pub mod join;
pub mod modal;
pub mod record;
pub mod resources;
pub mod screen;
pub mod stats;
pub mod store;
pub mod table;
pub mod tenant;
