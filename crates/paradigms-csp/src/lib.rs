//! CSP primitives for the paradigms tutorial runner
//!
//! Tasks ([`go`]) cooperate on a single thread and talk only through
//! [`Channel`]s. On top of channels sit the timer source ([`timeout`]),
//! select ([`Alts`]), and the fan-in and fan-out combinators ([`merge`],
//! [`flat_map`]).
//!
//! A receive never fails: an exhausted closed channel yields
//! [`Recv::Closed`]. Sending on a closed channel panics.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod ops;
pub mod scheduler;
pub mod select;
pub mod task;
pub mod timer;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{Channel, ChannelId, Recv, RecvFuture, SendFuture};
pub use config::SchedulerConfig;
pub use errors::{CspError, CspResult, TrySendError};
pub use ops::{drain, flat_map, map, merge, pipe};
pub use scheduler::{settle, Scheduler, SettleReport};
pub use select::{Alts, Selected};
pub use task::{current, go, ParkedTask, TaskId, TaskState};
pub use timer::{sleep, timeout};
