//! # statline-core
//!
//! Core types for the Statline metrics emitter.
//!
//! Statline turns a flat namespace of dotted metric paths into per-component
//! JSON documents, one per line, suitable for ingestion by document stores.
//! This crate holds the pieces shared across the workspace: the unified error
//! type and the emitter configuration.

mod config;
mod error;

pub use config::StdoutMetricsConfig;
pub use error::{Result, StatlineError};
