//! # Single-Flight Gates
//!
//! Per-key mutual exclusion inside one process. Callers on the same key run
//! one at a time; callers on different keys never wait for each other.
//! A gate is dropped from the map once its last holder leaves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
pub struct SingleFlight {
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        SingleFlight::default()
    }

    /// Runs `f` while holding the gate for `key`. The gate is released and,
    /// when unused, removed even if `f` panics.
    pub fn run<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let gate = {
            let mut gates = self.gates.lock();
            Arc::clone(gates.entry(key.to_string()).or_default())
        };
        let entry = GateEntry {
            flight: self,
            key,
            gate,
        };

        let _held = entry.gate.lock();
        f()
    }

    /// Number of keys with a caller inside or waiting.
    pub fn active_keys(&self) -> usize {
        self.gates.lock().len()
    }
}

// Drops the map entry once its last holder leaves.
struct GateEntry<'a> {
    flight: &'a SingleFlight,
    key: &'a str,
    gate: Arc<Mutex<()>>,
}

impl Drop for GateEntry<'_> {
    fn drop(&mut self) {
        let mut gates = self.flight.gates.lock();
        // Only the map and this caller hold the gate: nobody is waiting.
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(self.key);
        }
    }
}
