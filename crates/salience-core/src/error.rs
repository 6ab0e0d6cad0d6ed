//! Error types
//!
//! Runtime conditions (contention, stale references, evaluator failures)
//! are recovered in place and counted in [`crate::metrics::Metrics`];
//! the only fallible surface is configuration validation.

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A capacity or count field that must be non-zero was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A rate field left the unit interval.
    #[error("{field} must be in [0, 1], got {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },
}

/// Result alias for configuration validation.
pub type Result<T> = std::result::Result<T, ConfigError>;
