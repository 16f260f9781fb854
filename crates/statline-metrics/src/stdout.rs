//! Stdout metrics emitter
//!
//! Serverless-friendly metrics: instead of exposing an aggregator endpoint,
//! the process prints its metrics as JSON objects, one per line, grouped by
//! component instance. Separate objects per instance (rather than one
//! monolithic document) allow direct ingestion into document stores such as
//! Elasticsearch.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use statline_core::{Result, StatlineError, StdoutMetricsConfig};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::group::group;
use crate::store::{Local, StatCounter, StatGauge, StatTimer};

/// Emits the current metric snapshot as newline-delimited JSON documents.
///
/// Construction captures the start instant used for the `system.uptime`
/// stat, so uptime is relative to the emitter, not the process.
pub struct StdoutMetrics {
    local: Local,
    started_at: Instant,
    static_fields: Map<String, Value>,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl StdoutMetrics {
    /// Create an emitter writing to an arbitrary sink.
    ///
    /// Fails with [`StatlineError::Config`] if `static_fields` is not a JSON
    /// object. This is the only failure the emitter can produce; it happens
    /// once here, never during publishing.
    pub fn new(config: StdoutMetricsConfig, sink: Box<dyn Write + Send>) -> Result<Self> {
        let static_fields = match config.static_fields {
            Value::Object(fields) => fields,
            other => {
                return Err(StatlineError::Config(format!(
                    "static_fields must be a JSON object, got {other}"
                )))
            }
        };

        Ok(Self {
            local: Local::new(),
            started_at: Instant::now(),
            static_fields,
            sink: Mutex::new(sink),
        })
    }

    /// Create an emitter writing to standard output.
    pub fn with_stdout(config: StdoutMetricsConfig) -> Result<Self> {
        Self::new(config, Box::new(std::io::stdout()))
    }

    /// Get or create the counter registered at a path
    pub fn counter(&self, path: &str) -> StatCounter {
        self.local.counter(path)
    }

    /// Get or create the timer registered at a path
    pub fn timer(&self, path: &str) -> StatTimer {
        self.local.timer(path)
    }

    /// Get or create the gauge registered at a path
    pub fn gauge(&self, path: &str) -> StatGauge {
        self.local.gauge(path)
    }

    /// Snapshot the store and write one JSON line per component instance.
    ///
    /// Best-effort telemetry: a failed line is logged and skipped, the rest
    /// of the pass still runs. The sink is held for the whole pass so lines
    /// from overlapping publishes never interleave.
    pub fn publish(&self) {
        let objects = self.construct_all();

        let mut sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for fields in objects.values() {
            self.write_metric(sink.as_mut(), fields);
        }
        debug!(documents = objects.len(), "published metrics snapshot");
    }

    /// Emit one final snapshot and release the emitter.
    pub fn close(self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn construct_all(&self) -> HashMap<String, Map<String, Value>> {
        let mut objects = HashMap::new();

        construct_metrics(&mut objects, &self.local.get_counters());
        construct_metrics(&mut objects, &self.local.get_timings());

        let mut system = HashMap::new();
        system.insert(
            "system.uptime".to_string(),
            self.started_at.elapsed().as_millis() as i64,
        );
        system.insert("system.threads".to_string(), thread_count());
        construct_metrics(&mut objects, &system);

        objects
    }

    /// Write one document: static fields, then the timestamp, then the
    /// component fields layered on top. Component fields win on collision.
    fn write_metric(&self, sink: &mut dyn Write, fields: &Map<String, Value>) {
        let mut doc = self.static_fields.clone();
        doc.insert(
            "@timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        merge(&mut doc, fields);

        // Inputs are integers and a validated object; failure here is a bug
        let line = serde_json::to_string(&Value::Object(doc))
            .expect("metric document must serialize");

        if let Err(e) = writeln!(sink, "{line}") {
            warn!(error = %e, "failed to write metric line");
        }
    }
}

/// Group a flat `path -> value` map into per-instance component objects.
///
/// `pipeline.processor.1.count` and `pipeline.processor.1.error` both land
/// in the `pipeline.processor.1` object as sibling fields. Later writes to
/// the same slot overwrite earlier ones.
fn construct_metrics(
    objects: &mut HashMap<String, Map<String, Value>>,
    metrics: &HashMap<String, i64>,
) {
    for (path, value) in metrics {
        let (obj_key, val_key) = group(path);

        let fields = objects.entry(obj_key.clone()).or_insert_with(|| {
            let first = path.split('.').next().unwrap_or(path);
            let mut fields = Map::new();
            fields.insert("metric".to_string(), Value::String(obj_key.clone()));
            fields.insert("component".to_string(), Value::String(first.to_string()));
            fields
        });

        set_dotted(fields, &val_key, Value::from(*value));
    }
}

/// Set a value at a dotted key, creating intermediate objects as needed.
/// Non-object intermediates are replaced.
fn set_dotted(fields: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments = key.split('.').peekable();
    let mut current = fields;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot
            .as_object_mut()
            .expect("slot was just made an object");
    }
}

/// Recursively overlay `overlay` onto `base`; overlay wins on conflict.
fn merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        if let Value::Object(src) = value {
            if let Some(Value::Object(dst)) = base.get_mut(key) {
                merge(dst, src);
                continue;
            }
        }
        base.insert(key.clone(), value.clone());
    }
}

/// Count of schedulable execution units backing this process.
///
/// OS threads from `/proc/self/status` where available, otherwise the
/// available parallelism as a rough stand-in.
fn thread_count() -> i64 {
    #[cfg(target_os = "linux")]
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("Threads:") {
                if let Ok(n) = rest.trim().parse::<i64>() {
                    return n;
                }
            }
        }
    }

    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(1)
}

/// Publish on a fixed interval until the task is aborted.
///
/// The emitter itself never schedules; this is the conventional driver for
/// long-running processes that want periodic emission.
pub fn spawn_flusher(emitter: Arc<StdoutMetrics>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.tick().await; // interval fires immediately; skip the zeroth tick
        loop {
            tick.tick().await;
            emitter.publish();
        }
    })
}
