// Shared types for the rule filter
use serde::Serialize;

use crate::services::ServiceType;

/// Ruleset that claimed an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Name of the signatures source the ruleset came from
    pub source: String,
    /// Name of the matching ruleset
    pub ruleset: String,
    /// Service type assigned to the instance
    pub service_type: ServiceType,
}

/// Statistics from one classification call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    /// Number of instances handed to the filter
    pub input_instances: usize,
    /// Number of instances that matched a ruleset
    pub matched: usize,
    /// Number of instances no ruleset claimed
    pub dropped: usize,
    /// Rulesets evaluated across all instances
    pub rulesets_evaluated: usize,
    /// Total processing time in milliseconds
    pub processing_time_ms: u64,
}
