//! # statline-metrics
//!
//! Grouped JSON-per-line metrics emission.
//!
//! This crate provides:
//! - A local registry of counters, timers and gauges keyed by dotted path
//! - Path grouping that reconstructs which values belong to one component
//!   instance (`pipeline.processor.1.count` and `pipeline.processor.1.error`
//!   land in the same document)
//! - A stdout emitter that writes one compact JSON document per instance,
//!   with configured static fields and an RFC3339 timestamp merged in

mod group;
mod store;
mod stdout;

pub use group::group;
pub use store::{Local, StatCounter, StatGauge, StatTimer};
pub use stdout::{spawn_flusher, StdoutMetrics};
