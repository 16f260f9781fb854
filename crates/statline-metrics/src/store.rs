//! Local in-process metric registry
//!
//! Holds live counters, timers and gauges keyed by dotted path and hands out
//! cheap clonable handles backed by atomics. Snapshot reads copy the current
//! value of every path; each value is read atomically, so a snapshot is never
//! affected by increments that happen after it is taken.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Live counter handle for one metric path
#[derive(Clone)]
pub struct StatCounter {
    value: Arc<AtomicI64>,
}

impl StatCounter {
    /// Add a delta to the counter
    pub fn incr(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current counter value
    pub fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Live timer handle for one metric path
///
/// Records the most recent observation; the emitter reports already-aggregated
/// scalars, not distributions.
#[derive(Clone)]
pub struct StatTimer {
    value: Arc<AtomicI64>,
}

impl StatTimer {
    /// Record an elapsed duration in nanoseconds
    pub fn timing(&self, delta_ns: i64) {
        self.value.store(delta_ns, Ordering::Relaxed);
    }
}

/// Live gauge handle for one metric path
#[derive(Clone)]
pub struct StatGauge {
    value: Arc<AtomicI64>,
}

impl StatGauge {
    /// Set the gauge to an absolute value
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn incr(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn decr(&self, n: i64) {
        self.value.fetch_sub(n, Ordering::Relaxed);
    }
}

/// In-process registry of all live metric values
///
/// Gauges share the counter map, so they surface through [`Local::get_counters`]
/// alongside counters.
#[derive(Default)]
pub struct Local {
    counters: Mutex<HashMap<String, Arc<AtomicI64>>>,
    timings: Mutex<HashMap<String, Arc<AtomicI64>>>,
}

impl Local {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(map: &Mutex<HashMap<String, Arc<AtomicI64>>>, path: &str) -> Arc<AtomicI64> {
        let mut map = lock(map);
        map.entry(path.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone()
    }

    /// Get or create the counter registered at a path
    pub fn counter(&self, path: &str) -> StatCounter {
        StatCounter {
            value: Self::cell(&self.counters, path),
        }
    }

    /// Get or create the timer registered at a path
    pub fn timer(&self, path: &str) -> StatTimer {
        StatTimer {
            value: Self::cell(&self.timings, path),
        }
    }

    /// Get or create the gauge registered at a path
    pub fn gauge(&self, path: &str) -> StatGauge {
        StatGauge {
            value: Self::cell(&self.counters, path),
        }
    }

    /// Point-in-time copy of all counter and gauge values
    pub fn get_counters(&self) -> HashMap<String, i64> {
        snapshot(&self.counters)
    }

    /// Point-in-time copy of all timer values
    pub fn get_timings(&self) -> HashMap<String, i64> {
        snapshot(&self.timings)
    }
}

fn lock<'a>(
    map: &'a Mutex<HashMap<String, Arc<AtomicI64>>>,
) -> MutexGuard<'a, HashMap<String, Arc<AtomicI64>>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn snapshot(map: &Mutex<HashMap<String, Arc<AtomicI64>>>) -> HashMap<String, i64> {
    let map = lock(map);
    map.iter()
        .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
        .collect()
}
