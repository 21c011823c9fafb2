//! Command execution

use paradigms_runtime::{examples, ExampleRunner, RuntimeConfig};
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::error::Result;

/// Dispatches parsed commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn execute(cli: Cli, config: RuntimeConfig) -> Result<()> {
        match cli.command {
            Commands::List => {
                for line in Self::listing() {
                    println!("{}", line);
                }
                Ok(())
            }
            Commands::Run { example } => Self::run(&example, config),
        }
    }

    /// One line per example: slug, then title
    pub fn listing() -> Vec<String> {
        let width = examples::all()
            .iter()
            .map(|example| example.slug.len())
            .max()
            .unwrap_or(0);
        examples::all()
            .iter()
            .map(|example| format!("{:<width$}  {}", example.slug, example.title, width = width))
            .collect()
    }

    fn run(example: &str, config: RuntimeConfig) -> Result<()> {
        let runner = ExampleRunner::new(config)?;
        let report = runner.run_blocking(example)?;

        info!(
            "{} finished in {} ms",
            report.title,
            report.elapsed.as_millis()
        );
        for task in &report.settle.parked {
            debug!(task = %task.id, state = %task.state, "task left parked");
        }
        Ok(())
    }
}
