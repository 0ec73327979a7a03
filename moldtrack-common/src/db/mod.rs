//! Database schema, read models and queries

pub mod analytics;
pub mod init;
pub mod inspections;
pub mod models;

pub use analytics::*;
pub use init::*;
pub use inspections::*;
pub use models::*;
