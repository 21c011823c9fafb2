//! Configuration loading for the CLI
//!
//! Defaults come from [`RuntimeConfig::default`], a `--config` TOML file
//! replaces them, and command-line flags override both.

use anyhow::Context;
use paradigms_runtime::RuntimeConfig;
use tracing::info;

use crate::cli::Cli;
use crate::error::Result;

/// Build the runtime configuration for this invocation
pub fn load_configuration(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            RuntimeConfig::load_from_file(path)
                .with_context(|| format!("failed to load {}", path))?
        }
        None => RuntimeConfig::default(),
    };

    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(ms) = cli.race_timeout_ms {
        config.race_timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use clap::Parser;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from(["paradigms", "list", "--seed", "3", "--race-timeout-ms", "80"])
            .unwrap();
        let config = load_configuration(&cli).unwrap();
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.race_timeout_ms, 80);
    }

    #[test]
    fn test_zero_race_timeout_rejected() {
        let cli = Cli::try_parse_from(["paradigms", "list", "--race-timeout-ms", "0"]).unwrap();
        assert!(matches!(
            load_configuration(&cli),
            Err(CliError::Runtime(_))
        ));
    }

    #[test]
    fn test_missing_config_file_reports_path() {
        let cli = Cli::try_parse_from(["paradigms", "list", "-c", "/nonexistent/paradigms.toml"])
            .unwrap();
        match load_configuration(&cli) {
            Err(CliError::Config(message)) => {
                assert!(message.contains("/nonexistent/paradigms.toml"))
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
