//! Error types for simulation operations.

use crate::InstanceId;
use thiserror::Error;

/// Errors that can occur during simulation.
///
/// Two failure classes from the synchronization protocol are deliberately
/// *not* errors: unsupported host shapes are skipped with a warning during
/// model building, and stale manager registrations are pruned at the next
/// tick. Both are expected consequences of host-side editing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// The instance was stepped or queried before `finalize()` succeeded.
    #[error("instance is not compiled; build() and finalize() must succeed first")]
    NotCompiled,

    /// A manager lookup referenced an id that is not registered.
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    /// A selection-based lookup ran with nothing selected.
    #[error("no instance selected")]
    NothingSelected,

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid frame timing.
    #[error("invalid frame timing: {0} (must be positive and finite)")]
    InvalidTiming(f32),

    /// A geometry source was present but unusable.
    #[error("empty or inconsistent geometry source: {reason}")]
    EmptySource {
        /// Description of what's wrong with the source.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an empty-source error.
    #[must_use]
    pub fn empty_source(reason: impl Into<String>) -> Self {
        Self::EmptySource {
            reason: reason.into(),
        }
    }

    /// Check if this is a not-compiled error.
    #[must_use]
    pub fn is_not_compiled(&self) -> bool {
        matches!(self, Self::NotCompiled)
    }

    /// Check if this is a not-found condition (including an empty
    /// selection).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NothingSelected)
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = InstanceId::fresh();
        let err = SimError::NotFound(id);
        assert!(err.to_string().contains(&id.raw().to_string()));

        let err = SimError::invalid_config("substeps must be at least 1");
        assert!(err.to_string().contains("substeps"));

        let err = SimError::NotCompiled;
        assert!(err.to_string().contains("finalize"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::NotCompiled;
        assert!(err.is_not_compiled());
        assert!(!err.is_not_found());

        let err = SimError::NotFound(InstanceId::fresh());
        assert!(err.is_not_found());
        assert!(!err.is_config_error());

        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
    }
}
