//! Configuration for the stdout metrics emitter
//!
//! The only tunable is `static_fields`: an arbitrary JSON object merged into
//! every emitted document. It must be a JSON object; the emitter rejects
//! anything else at construction time.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Configuration for the stdout metrics emitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdoutMetricsConfig {
    /// Fields merged into every emitted document
    #[serde(default = "default_static_fields")]
    pub static_fields: Value,
}

fn default_static_fields() -> Value {
    json!({ "@service": "statline" })
}

impl Default for StdoutMetricsConfig {
    fn default() -> Self {
        Self {
            static_fields: default_static_fields(),
        }
    }
}
