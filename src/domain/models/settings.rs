//! Settings trees handed to jobs.
//!
//! A [`SettingsTree`] is an arbitrary nested mapping/sequence/scalar value as
//! read from a design settings file. [`JobSettings`] is the typed snapshot a
//! single job receives: the design section and the flow section, with the
//! clock period already overlaid.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary nested settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsTree(Value);

impl Default for SettingsTree {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl From<Value> for SettingsTree {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl SettingsTree {
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a dotted path (`design.name`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.0, |node, key| node.as_object()?.get(key))
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Numeric lookup that also accepts numeric strings, as hand-edited
    /// settings files often quote numbers.
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        match self.get_path(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        match self.get_path(path)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Set a dotted path, creating intermediate mappings. Non-mapping nodes on
    /// the way are replaced.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut node = &mut self.0;
        let mut keys = path.split('.').peekable();
        while let Some(key) = keys.next() {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return;
            };
            if keys.peek().is_none() {
                map.insert(key.to_string(), value);
                return;
            }
            node = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }

    /// Remove a top-level key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.as_object_mut()?.remove(key)
    }
}

/// Flow settings keys that steer the search itself. They never reach a job,
/// so the search window or timeout does not change a job's fingerprint.
pub const SEARCH_CONTROL_KEYS: [&str; 3] = ["fmax_low_freq", "fmax_high_freq", "timeout"];

/// Settings snapshot for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobSettings {
    pub design: SettingsTree,
    pub flow: SettingsTree,
}

impl JobSettings {
    pub const fn new(design: SettingsTree, flow: SettingsTree) -> Self {
        Self { design, flow }
    }

    /// The tree that identifies this job for hashing and caching.
    pub fn to_tree(&self) -> SettingsTree {
        let mut map = Map::new();
        map.insert("design".to_string(), self.design.as_value().clone());
        map.insert("flow".to_string(), self.flow.as_value().clone());
        SettingsTree(Value::Object(map))
    }

    /// Overlay the clock period (ns) and per-job thread count on the flow
    /// section, dropping the search control keys.
    #[must_use]
    pub fn for_clock_period(&self, clock_period_ns: f64, nthreads: usize) -> Self {
        let mut flow = self.flow.clone();
        for key in SEARCH_CONTROL_KEYS {
            flow.remove(key);
        }
        flow.set_path("clock_period", Value::from(clock_period_ns));
        flow.set_path("nthreads", Value::from(nthreads));
        Self {
            design: self.design.clone(),
            flow,
        }
    }

    pub fn clock_period(&self) -> Option<f64> {
        self.flow.get_f64("clock_period")
    }
}
