//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "paradigms", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Seed for producer delays and select tie-breaks
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Race timer of the timeout example, in milliseconds
    #[arg(long, global = true)]
    pub race_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List the available examples
    List,
    /// Run one example and print what it logs
    Run {
        /// Example title or slug, e.g. "intro-to-csp"
        example: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "paradigms",
            "run",
            "get-movies-with-timeout-csp",
            "--seed",
            "7",
            "--race-timeout-ms",
            "250",
            "-v",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Run {
                example: "get-movies-with-timeout-csp".to_string()
            }
        );
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.race_timeout_ms, Some(250));
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_list_with_config() {
        let cli = Cli::try_parse_from(["paradigms", "--config", "paradigms.toml", "list"]).unwrap();
        assert_eq!(cli.command, Commands::List);
        assert_eq!(cli.config.as_deref(), Some("paradigms.toml"));
    }

    #[test]
    fn test_run_requires_example() {
        assert!(Cli::try_parse_from(["paradigms", "run"]).is_err());
        assert!(Cli::try_parse_from(["paradigms"]).is_err());
    }
}
