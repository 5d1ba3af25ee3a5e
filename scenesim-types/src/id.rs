//! Instance identity.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-wide counter backing [`InstanceId::fresh`]. Ids start at 1 so a
/// zero id can never be mistaken for a live instance.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque unique identifier for a simulation instance.
///
/// Assigned once at instance construction and immutable thereafter. Ids are
/// drawn from a process-wide monotone counter and are never reused, even
/// after the instance is removed from its manager.
///
/// # Example
///
/// ```
/// use scenesim_types::InstanceId;
///
/// let a = InstanceId::fresh();
/// let b = InstanceId::fresh();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a new, never-before-used id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value (for logging and diagnostics only).
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}
