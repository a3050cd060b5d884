//! Reasoning-trace records
//!
//! `*_with_trace` query variants return a `TraceStep` alongside their result
//! so the calling agent can append it to its reasoning trace. Trace steps are
//! pure output data, never a control channel: queries behave identically with
//! or without them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One step of the caller's reasoning trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// What was done (`find_hotspots`, `path_query`, ...)
    pub action: String,
    /// What it was done to (node ID, package, graph)
    pub target: String,
    /// Tool identifier for the trace consumer
    pub tool: String,
    pub duration: Duration,
    /// Query-specific counts and derived names
    pub metadata: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl TraceStep {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            tool: "codegraph-analytics".to_string(),
            duration: Duration::ZERO,
            metadata: BTreeMap::new(),
            error: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accumulates() {
        let step = TraceStep::new("find_hotspots", "graph")
            .with_meta("top_k", 10)
            .with_meta("node_count", 250);

        assert_eq!(step.metadata["top_k"], "10");
        assert_eq!(step.metadata["node_count"], "250");
        assert!(step.error.is_none());
        assert_eq!(step.tool, "codegraph-analytics");
    }
}
