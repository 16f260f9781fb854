//! Demonstration of the stdout metrics emitter.
//!
//! Simulates a small pipeline doing some work, then emits periodically and
//! once more on shutdown. Run with `cargo run --example stdout_demo`; each
//! line on stdout is one component-instance document.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use statline_core::StdoutMetricsConfig;
use statline_metrics::{spawn_flusher, StdoutMetrics};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let emitter = Arc::new(StdoutMetrics::with_stdout(StdoutMetricsConfig::default())?);

    let received = emitter.counter("input.kafka.received");
    let processed = emitter.counter("pipeline.processor.0.count");
    let errored = emitter.counter("pipeline.processor.0.error");
    let latency = emitter.timer("pipeline.processor.0.latency");
    let backlog = emitter.gauge("buffer.backlog");

    let flusher = spawn_flusher(emitter.clone(), Duration::from_millis(400));

    for i in 0..50i64 {
        received.incr(1);
        backlog.incr(1);
        processed.incr(1);
        if i % 10 == 9 {
            errored.incr(1);
        }
        latency.timing(1_200_000 + i * 10_000);
        backlog.decr(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    flusher.abort();
    let _ = flusher.await;

    // Final snapshot on shutdown
    match Arc::try_unwrap(emitter) {
        Ok(emitter) => emitter.close()?,
        Err(emitter) => emitter.publish(),
    }

    Ok(())
}
