//! DispatchOutcome - result of one dispatch attempt

use serde::{Deserialize, Serialize};

/// Outcome of a single dispatch attempt for one symbol.
///
/// Deferrals are ordinary results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Value handed to the sink
    Dispatched,
    /// Global rate window is saturated
    DeferredGlobal,
    /// Symbol was dispatched too recently
    DeferredCooldown,
    /// Nothing pending for the symbol
    NoValue,
}

impl DispatchOutcome {
    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::DeferredGlobal => "deferred_global",
            Self::DeferredCooldown => "deferred_cooldown",
            Self::NoValue => "no_value",
        }
    }

    /// True for either deferral
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::DeferredGlobal | Self::DeferredCooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(DispatchOutcome::Dispatched.as_str(), "dispatched");
        assert_eq!(DispatchOutcome::DeferredGlobal.as_str(), "deferred_global");
        assert!(DispatchOutcome::DeferredCooldown.is_deferred());
        assert!(!DispatchOutcome::NoValue.is_deferred());
    }
}
