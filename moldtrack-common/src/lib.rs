//! # Moldtrack Common Library
//!
//! Shared code for the Moldtrack crates including:
//! - Database initialization and schema
//! - Read models for the inspection entity graph
//! - Inspection listing/lookup queries
//! - Analytics aggregation queries
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
