//! # Moldtrack Ingestion
//!
//! Turns loosely structured dataset records into the strict relational
//! schema. A raw record flows through three stages:
//!
//! 1. [`normalize`] — rename keys, coerce the timestamp, default missing
//!    structures; pure, no typing decisions.
//! 2. [`validate`] — strict shape check producing a typed
//!    [`validate::InspectionRecord`], collecting every problem at once.
//! 3. [`pipeline`] — one atomic transaction writing the full entity graph.
//!
//! [`source`] loads the dataset payload from a path, `file://` URI or
//! HTTP(S) URL.

pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod validate;
