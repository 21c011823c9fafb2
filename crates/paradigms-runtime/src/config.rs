//! Runtime Configuration
//!
//! Pacing, race timing and fixture data for the tutorial examples. Every
//! struct has a `Default` that reproduces the tutorial's timings and can be
//! overridden from a TOML file:
//!
//! ```toml
//! race_timeout_ms = 500
//! seed = 7
//!
//! [pacing.items]
//! initial = { kind = "uniform", min_ms = 0, max_ms = 1000 }
//! per_item = { kind = "fixed", ms = 0 }
//!
//! [pacing.overrides.Horror]
//! initial = { kind = "fixed", ms = 900 }
//! per_item = { kind = "fixed", ms = 0 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use paradigms_csp::SchedulerConfig;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::errors::{RuntimeError, RuntimeResult};

// ----------------------------------------------------------------------------
// Delays
// ----------------------------------------------------------------------------

/// A wait before a producer emits, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delay {
    Fixed { ms: u64 },
    /// Drawn uniformly from `min_ms..=max_ms` on every use
    Uniform { min_ms: u64, max_ms: u64 },
}

impl Delay {
    pub const NONE: Delay = Delay::Fixed { ms: 0 };

    pub fn fixed(ms: u64) -> Self {
        Delay::Fixed { ms }
    }

    pub fn uniform(min_ms: u64, max_ms: u64) -> Self {
        Delay::Uniform { min_ms, max_ms }
    }

    pub fn sample(&self, rng: &mut fastrand::Rng) -> Duration {
        let ms = match *self {
            Delay::Fixed { ms } => ms,
            Delay::Uniform { min_ms, max_ms } => rng.u64(min_ms..=max_ms),
        };
        Duration::from_millis(ms)
    }

    /// Longest wait this delay can produce
    pub fn upper_bound(&self) -> Duration {
        match *self {
            Delay::Fixed { ms } | Delay::Uniform { max_ms: ms, .. } => Duration::from_millis(ms),
        }
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        match *self {
            Delay::Uniform { min_ms, max_ms } if min_ms > max_ms => Err(RuntimeError::Config(
                format!("uniform delay has min_ms {} above max_ms {}", min_ms, max_ms),
            )),
            _ => Ok(()),
        }
    }
}

/// Waits applied by one producer: once before the first value, then before
/// every value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerPacing {
    pub initial: Delay,
    pub per_item: Delay,
}

impl ProducerPacing {
    /// Emit everything without waiting
    pub fn instant() -> Self {
        Self {
            initial: Delay::NONE,
            per_item: Delay::NONE,
        }
    }

    /// A single fixed wait before the first value
    pub fn after(ms: u64) -> Self {
        Self {
            initial: Delay::fixed(ms),
            per_item: Delay::NONE,
        }
    }

    fn validate(&self) -> RuntimeResult<()> {
        self.initial.validate()?;
        self.per_item.validate()
    }
}

// ----------------------------------------------------------------------------
// Pacing Configuration
// ----------------------------------------------------------------------------

/// Pacing of every producer the examples use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// `numbers(start, end)`
    pub numbers: ProducerPacing,
    /// `categories()`
    pub categories: ProducerPacing,
    /// `items_in_category(category)` unless overridden below
    pub items: ProducerPacing,
    /// Per-category replacements for `items`
    pub overrides: BTreeMap<String, ProducerPacing>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            numbers: ProducerPacing {
                initial: Delay::NONE,
                per_item: Delay::fixed(500),
            },
            categories: ProducerPacing {
                initial: Delay::uniform(0, 1000),
                per_item: Delay::NONE,
            },
            items: ProducerPacing {
                initial: Delay::uniform(0, 1000),
                per_item: Delay::NONE,
            },
            overrides: BTreeMap::new(),
        }
    }
}

impl PacingConfig {
    /// No producer waits at all
    pub fn instant() -> Self {
        Self {
            numbers: ProducerPacing::instant(),
            categories: ProducerPacing::instant(),
            items: ProducerPacing::instant(),
            overrides: BTreeMap::new(),
        }
    }

    /// Override the item pacing of one category
    pub fn with_override<S: Into<String>>(mut self, category: S, pacing: ProducerPacing) -> Self {
        self.overrides.insert(category.into(), pacing);
        self
    }

    pub fn items_for(&self, category: &str) -> &ProducerPacing {
        self.overrides.get(category).unwrap_or(&self.items)
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        self.numbers.validate()?;
        self.categories.validate()?;
        self.items.validate()?;
        self.overrides.values().try_for_each(ProducerPacing::validate)
    }
}

// ----------------------------------------------------------------------------
// Runtime Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for running tutorial examples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fixture data read by the movie producers
    pub catalog: Catalog,
    /// Producer timings
    pub pacing: PacingConfig,
    /// Timer each category races against in the timeout example
    pub race_timeout_ms: u64,
    /// Seeds both producer delays and select tie-breaks
    pub seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            pacing: PacingConfig::default(),
            race_timeout_ms: 500,
            seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Create configuration for fast, reproducible tests
    pub fn testing() -> Self {
        Self {
            pacing: PacingConfig::instant(),
            seed: Some(0),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_race_timeout(mut self, timeout: Duration) -> Self {
        self.race_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn race_timeout(&self) -> Duration {
        Duration::from_millis(self.race_timeout_ms)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            rng_seed: self.seed,
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RuntimeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.race_timeout_ms == 0 {
            return Err(RuntimeError::Config(
                "race_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.catalog.validate()?;
        self.pacing.validate()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_timeout_saturates_instead_of_wrapping() {
        let config = RuntimeConfig::default().with_race_timeout(Duration::MAX);
        assert_eq!(config.race_timeout_ms, u64::MAX);

        let config = RuntimeConfig::default().with_race_timeout(Duration::from_millis(250));
        assert_eq!(config.race_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_defaults_match_tutorial_timings() {
        let config = RuntimeConfig::default();
        assert_eq!(config.race_timeout(), Duration::from_millis(500));
        assert_eq!(config.pacing.numbers.per_item, Delay::fixed(500));
        assert_eq!(config.pacing.items.initial, Delay::uniform(0, 1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            seed = 7

            [pacing.overrides.Horror]
            initial = { kind = "fixed", ms = 900 }
            per_item = { kind = "fixed", ms = 0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.race_timeout_ms, 500);
        assert_eq!(config.catalog, Catalog::movies());
        assert_eq!(config.pacing.items_for("Horror"), &ProducerPacing::after(900));
        assert_eq!(config.pacing.items_for("Action"), &config.pacing.items);
        assert_eq!(config.scheduler_config().rng_seed, Some(7));
    }

    #[test]
    fn test_toml_catalog_replaces_movies() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [[catalog.categories]]
            name = "Jazz"
            items = ["Kind of Blue"]
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.category_names(), vec!["Jazz"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("race_timeout_ms = 0"),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml_str(
                "[pacing.numbers]\ninitial = { kind = \"uniform\", min_ms = 10, max_ms = 1 }\nper_item = { kind = \"fixed\", ms = 0 }"
            ),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml_str("race_timeout_ms = \"soon\""),
            Err(RuntimeError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_uniform_delay_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(1);
        let delay = Delay::uniform(0, 1000);
        for _ in 0..100 {
            assert!(delay.sample(&mut rng) <= delay.upper_bound());
        }
        assert_eq!(Delay::fixed(5).sample(&mut rng), Duration::from_millis(5));
    }
}
