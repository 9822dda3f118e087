//! Metric domain model
//!
//! A metric is either a counter (updates are deltas summed into a running
//! total) or a gauge (updates replace the stored value). The value shape is
//! fused with the kind, so a counter can only ever carry an `i64` and a gauge
//! an `f64` — a wrong-shaped value is unrepresentable.
//!
//! The serde representation is the snapshot file entry format:
//! `{"type": "counter", "value": 8}` / `{"type": "gauge", "value": 36.6}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single metric value, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Metric {
    /// Running total; updates carry a delta that is added to the total.
    Counter(i64),

    /// Point-in-time measurement; updates replace the stored value.
    Gauge(f64),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
        }
    }
}

/// Kind of a metric, detached from its value.
///
/// Used for the kind-immutability check: once a name is registered with one
/// kind, updates with the other kind are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind() {
        assert_eq!(Metric::Counter(5).kind(), MetricKind::Counter);
        assert_eq!(Metric::Gauge(36.6).kind(), MetricKind::Gauge);
    }

    #[test]
    fn test_counter_serializes_as_integer() {
        let value = serde_json::to_value(Metric::Counter(8)).unwrap();
        assert_eq!(value, json!({"type": "counter", "value": 8}));
    }

    #[test]
    fn test_gauge_serializes_as_float() {
        let value = serde_json::to_value(Metric::Gauge(37.1)).unwrap();
        assert_eq!(value, json!({"type": "gauge", "value": 37.1}));
    }

    #[test]
    fn test_deserialize_round_trip() {
        let metric: Metric = serde_json::from_str(r#"{"type":"gauge","value":1.5}"#).unwrap();
        assert_eq!(metric, Metric::Gauge(1.5));
    }
}
