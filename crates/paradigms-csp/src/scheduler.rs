//! Scheduler
//!
//! A [`Scheduler`] owns a tokio current-thread runtime: every task spawned
//! under it runs on the calling thread and interleaves only at channel, select
//! and timer suspension points.
//!
//! [`settle`] runs a body as the root of a fresh task group and returns once
//! the group can make no further progress, reporting any task left parked on a
//! channel. Fire-and-forget programs finish this way instead of hanging on
//! producers that nobody drains.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::errors::CspResult;
use crate::task::{spawn_in, ParkedTask, Registry, TaskId};

// ----------------------------------------------------------------------------
// Settle Report
// ----------------------------------------------------------------------------

/// Outcome of [`settle`]: the root task and every task still parked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleReport {
    pub root: TaskId,
    pub parked: Vec<ParkedTask>,
}

impl SettleReport {
    /// No task was left behind
    pub fn is_clean(&self) -> bool {
        self.parked.is_empty()
    }

    pub fn leaked(&self) -> usize {
        self.parked.len()
    }
}

impl fmt::Display for SettleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} settled", self.root)?;
        if self.parked.is_empty() {
            return write!(f, " cleanly");
        }
        write!(f, " with {} parked task(s):", self.parked.len())?;
        for task in &self.parked {
            write!(f, " {} {};", task.id, task.state)?;
        }
        Ok(())
    }
}

/// Run `body` as the root of a new task group and resolve once every task in
/// the group has finished or is parked on a channel operation.
///
/// Tasks waiting on a timer keep the group alive. Tasks parked forever are
/// reported, not cancelled.
///
/// # Panics
///
/// A panic in any task of the group (for example a send on a closed channel)
/// stops the wait and is raised again here.
pub async fn settle<F>(body: F) -> SettleReport
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = Arc::new(Registry::default());
    let root = spawn_in(registry.clone(), body);
    registry.settled().await;
    if let Some(payload) = registry.take_panic() {
        std::panic::resume_unwind(payload);
    }

    let report = SettleReport {
        root,
        parked: registry.parked(),
    };
    debug!(root = %root, leaked = report.leaked(), "{}", report);
    report
}

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

/// Single-threaded cooperative scheduler
pub struct Scheduler {
    runtime: Runtime,
    config: SchedulerConfig,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish()
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> CspResult<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        debug!(seed = ?config.rng_seed, "scheduler created");
        Ok(Self { runtime, config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Drive `future` to completion on the scheduler thread
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        if let Some(seed) = self.config.rng_seed {
            fastrand::seed(seed);
        }
        self.runtime.block_on(future)
    }

    /// Run `body` as a root task and block until its group settles
    pub fn settle<F>(&self, body: F) -> SettleReport
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.block_on(settle(body))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
