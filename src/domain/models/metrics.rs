//! Flow results and the metric values they carry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single flow-specific metric.
///
/// Flows report a mix of numbers, flags and strings; the engine treats them
/// as opaque and only formats them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetricValue>),
}

impl MetricValue {
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:.6}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Result of one flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    /// Whether the flow completed and met timing.
    #[serde(default)]
    pub success: bool,

    /// Worst negative slack in ns (negative means a violation).
    #[serde(default)]
    pub wns: f64,

    /// Clock period the flow ran with, in ns.
    #[serde(default)]
    pub clock_period: f64,

    /// Everything else the flow reported.
    #[serde(flatten)]
    pub metrics: BTreeMap<String, MetricValue>,
}

impl FlowResult {
    pub const fn new(success: bool, wns: f64, clock_period: f64) -> Self {
        Self {
            success,
            wns,
            clock_period,
            metrics: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// All entries, the fixed fields first, as the formatter shows them.
    /// Keys starting with `_` are private to the flow and skipped.
    pub fn entries(&self) -> Vec<(String, MetricValue)> {
        let mut entries = vec![
            ("success".to_string(), MetricValue::Bool(self.success)),
            ("clock_period".to_string(), MetricValue::Float(self.clock_period)),
            ("wns".to_string(), MetricValue::Float(self.wns)),
        ];
        entries.extend(
            self.metrics
                .iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        entries
    }
}
