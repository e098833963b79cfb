//! Audit trail configuration
//!
//! Thresholds are configurable, not hardcoded into the detection queries.

use serde::{Deserialize, Serialize};

/// Configuration for retention and suspicious-activity detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Default retention window for new records, in days
    pub retention_period_days: i64,
    /// Rolling window for failure aggregation, in minutes
    pub suspicious_window_minutes: i64,
    /// Failures per (actor, ip) within the window that become reportable
    pub suspicious_failure_threshold: i64,
    /// Failed authentication attempts per actor that recommend a lock
    pub lockout_failure_threshold: i64,
    /// Only destructive cleanup: non-archived records older than this
    /// horizon may be hard-deleted
    pub hard_expiry_days: i64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_period_days: 365,
            suspicious_window_minutes: 60,
            suspicious_failure_threshold: 3,
            lockout_failure_threshold: 5,
            hard_expiry_days: 730,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();

        assert_eq!(config.retention_period_days, 365);
        assert_eq!(config.suspicious_window_minutes, 60);
        assert_eq!(config.suspicious_failure_threshold, 3);
        assert_eq!(config.lockout_failure_threshold, 5);
        assert_eq!(config.hard_expiry_days, 730);
    }
}
