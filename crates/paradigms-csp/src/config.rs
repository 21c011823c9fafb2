//! Scheduler configuration

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Scheduler Configuration
// ----------------------------------------------------------------------------

/// Settings for a [`Scheduler`](crate::Scheduler)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seed for select tie-breaks; `None` keeps them unpredictable
    pub rng_seed: Option<u64>,
}

impl SchedulerConfig {
    /// Reproducible select tie-breaks
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
        }
    }

    /// Create configuration for deterministic tests
    pub fn testing() -> Self {
        Self::seeded(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(SchedulerConfig::default().rng_seed, None);
        assert_eq!(SchedulerConfig::seeded(9).rng_seed, Some(9));
        assert_eq!(SchedulerConfig::testing().rng_seed, Some(0));
    }
}
