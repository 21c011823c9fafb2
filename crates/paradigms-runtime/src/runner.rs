//! Example runner
//!
//! Runs one named example as the root of a fresh task group and waits for the
//! group to settle. Examples that leave tasks behind (the timeout race
//! abandons slow producers) still finish; the leftovers are reported.

use std::sync::Arc;
use std::time::Duration;

use paradigms_csp::{settle, Scheduler, SettleReport};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::errors::RuntimeResult;
use crate::examples::{self, ExampleContext};
use crate::producers::Producers;
use crate::sink::{ConsoleLogger, SharedLogger};

/// Outcome of one example run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub title: &'static str,
    pub settle: SettleReport,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn leaked_tasks(&self) -> usize {
        self.settle.leaked()
    }
}

/// Runs examples against one configuration and logger
pub struct ExampleRunner {
    config: RuntimeConfig,
    logger: SharedLogger,
}

impl ExampleRunner {
    /// Create a runner printing to stdout
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger: Arc::new(ConsoleLogger::new()),
        })
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `name` (title or slug) on the current tokio runtime
    pub async fn run(&self, name: &str) -> RuntimeResult<RunReport> {
        let example = examples::find(name)?;
        let context = ExampleContext {
            producers: Producers::new(&self.config),
            logger: self.logger.clone(),
            race_timeout: self.config.race_timeout(),
        };

        if let Some(seed) = self.config.seed {
            // select tie-breaks draw from the thread-local generator
            fastrand::seed(seed);
        }

        info!(example = example.title, seed = ?self.config.seed, "Starting example");
        let started = Instant::now();
        let settled = settle(example.start(context)).await;
        let elapsed = started.elapsed();

        if !settled.is_clean() {
            debug!(example = example.title, "{}", settled);
        }
        info!(
            example = example.title,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            leaked = settled.leaked(),
            "Example finished"
        );

        Ok(RunReport {
            title: example.title,
            settle: settled,
            elapsed,
        })
    }

    /// Run `name` on a new scheduler built from the runtime config
    pub fn run_blocking(&self, name: &str) -> RuntimeResult<RunReport> {
        let scheduler = Scheduler::new(self.config.scheduler_config())?;
        scheduler.block_on(self.run(name))
    }
}
