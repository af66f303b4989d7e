pub mod core;
pub mod export;
pub mod records;
pub mod setup;
pub mod stats;
