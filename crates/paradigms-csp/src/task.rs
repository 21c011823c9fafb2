//! Tasks
//!
//! A task is an `async` body handed to [`go`]. Tasks run on the scheduler's
//! single thread and suspend only inside channel, select and timer futures, so
//! everything between two suspension points runs without interruption.
//!
//! Each task is enrolled in the registry of the group that spawned it. The
//! registry tracks one [`TaskState`] per live task; channel futures park the
//! current task when they return `Pending` and channel wakers flip it back to
//! [`TaskState::Runnable`]. A group whose live tasks are all parked on channel
//! operations can make no further progress and is considered settled.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{error, trace};

use crate::channel::ChannelId;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

// ----------------------------------------------------------------------------
// Task Identity and State
// ----------------------------------------------------------------------------

/// Process-unique task identifier, used in logs and settle reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// What a live task is currently doing. A task is in exactly one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Runnable,
    BlockedOnSend(ChannelId),
    BlockedOnReceive(ChannelId),
    BlockedOnSelect(Vec<ChannelId>),
    BlockedOnTimer,
}

impl TaskState {
    /// Parked on a channel operation, so only another task can wake it
    pub fn is_parked_on_channel(&self) -> bool {
        matches!(
            self,
            TaskState::BlockedOnSend(_)
                | TaskState::BlockedOnReceive(_)
                | TaskState::BlockedOnSelect(_)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Runnable => write!(f, "runnable"),
            TaskState::BlockedOnSend(channel) => write!(f, "blocked on send to {}", channel),
            TaskState::BlockedOnReceive(channel) => {
                write!(f, "blocked on receive from {}", channel)
            }
            TaskState::BlockedOnSelect(channels) => {
                write!(f, "blocked on select over [")?;
                for (i, channel) in channels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", channel)?;
                }
                write!(f, "]")
            }
            TaskState::BlockedOnTimer => write!(f, "blocked on timer"),
        }
    }
}

/// A task left parked on a channel when its group settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkedTask {
    pub id: TaskId,
    pub state: TaskState,
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct TaskRecord {
    id: TaskId,
    state: Mutex<TaskState>,
}

impl TaskRecord {
    pub(crate) fn mark_runnable(&self) {
        *self.state.lock() = TaskState::Runnable;
    }
}

/// Panic payload carried out of a task
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Live tasks of one group, keyed by id
#[derive(Debug, Default)]
pub(crate) struct Registry {
    tasks: Mutex<HashMap<TaskId, Arc<TaskRecord>>>,
    /// First panic raised by any task of the group
    panic: Mutex<Option<PanicPayload>>,
    changed: Notify,
}

impl Registry {
    fn enroll(&self) -> Arc<TaskRecord> {
        let record = Arc::new(TaskRecord {
            id: TaskId::next(),
            state: Mutex::new(TaskState::Runnable),
        });
        self.tasks.lock().insert(record.id, record.clone());
        record
    }

    fn depart(&self, id: TaskId) {
        self.tasks.lock().remove(&id);
        trace!(task = %id, "task finished");
        self.changed.notify_one();
    }

    fn record_panic(&self, id: TaskId, payload: PanicPayload) {
        error!(task = %id, "task panicked");
        let mut first = self.panic.lock();
        if first.is_none() {
            *first = Some(payload);
        }
        drop(first);
        self.changed.notify_one();
    }

    /// Take the first panic raised in the group, if any
    pub(crate) fn take_panic(&self) -> Option<PanicPayload> {
        self.panic.lock().take()
    }

    fn is_settled(&self) -> bool {
        self.tasks
            .lock()
            .values()
            .all(|record| record.state.lock().is_parked_on_channel())
    }

    /// Resolves once every live task is parked on a channel (or none are
    /// left), or as soon as a task has panicked
    pub(crate) async fn settled(&self) {
        loop {
            if self.panic.lock().is_some() || self.is_settled() {
                return;
            }
            self.changed.notified().await;
        }
    }

    pub(crate) fn parked(&self) -> Vec<ParkedTask> {
        let mut parked: Vec<ParkedTask> = self
            .tasks
            .lock()
            .values()
            .map(|record| ParkedTask {
                id: record.id,
                state: record.state.lock().clone(),
            })
            .collect();
        parked.sort_by_key(|task| task.id);
        parked
    }
}

// ----------------------------------------------------------------------------
// Current Task Context
// ----------------------------------------------------------------------------

#[derive(Clone)]
struct TaskContext {
    registry: Arc<Registry>,
    record: Arc<TaskRecord>,
}

tokio::task_local! {
    static CURRENT: TaskContext;
}

/// Record of the task being polled, if it was spawned with [`go`]
pub(crate) fn current_record() -> Option<Arc<TaskRecord>> {
    CURRENT.try_with(|ctx| ctx.record.clone()).ok()
}

/// Id of the task being polled, if it was spawned with [`go`]
pub fn current() -> Option<TaskId> {
    CURRENT.try_with(|ctx| ctx.record.id).ok()
}

/// Mark the current task as suspended for `state`
pub(crate) fn park(state: TaskState) {
    let _ = CURRENT.try_with(|ctx| {
        trace!(task = %ctx.record.id, state = %state, "task parked");
        *ctx.record.state.lock() = state;
        ctx.registry.changed.notify_one();
    });
}

/// Mark the current task as runnable again after a timer wait
pub(crate) fn unpark() {
    let _ = CURRENT.try_with(|ctx| ctx.record.mark_runnable());
}

// ----------------------------------------------------------------------------
// Spawning
// ----------------------------------------------------------------------------

/// Spawn `body` as a new task and return immediately.
///
/// The task joins the group of the calling task; called from outside any task
/// it starts a group of its own. There is no join handle: completion is only
/// observable through what the task does to channels. A panic inside the task
/// is held by its group and raised again by [`settle`](crate::settle).
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn go<F>(body: F) -> TaskId
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = CURRENT
        .try_with(|ctx| ctx.registry.clone())
        .unwrap_or_default();
    spawn_in(registry, body)
}

pub(crate) fn spawn_in<F>(registry: Arc<Registry>, body: F) -> TaskId
where
    F: Future<Output = ()> + Send + 'static,
{
    let record = registry.enroll();
    let id = record.id;
    let departure = Departure {
        registry: registry.clone(),
        id,
    };
    let context = TaskContext {
        registry: registry.clone(),
        record,
    };

    trace!(task = %id, "task spawned");
    tokio::spawn(CURRENT.scope(context, async move {
        let _departure = departure;
        if let Err(payload) = AssertUnwindSafe(body).catch_unwind().await {
            registry.record_panic(id, payload);
        }
    }));
    id
}

/// Removes a task from its registry when the body returns or is dropped
struct Departure {
    registry: Arc<Registry>,
    id: TaskId,
}

impl Drop for Departure {
    fn drop(&mut self) {
        self.registry.depart(self.id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_go_returns_before_body_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        go(async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(!ran.load(Ordering::SeqCst));

        tokio::task::yield_now().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_current_is_set_inside_tasks_only() {
        assert!(current().is_none());

        let seen = Channel::unbuffered();
        let tx = seen.clone();
        let spawned = go(async move {
            tx.send(current()).await;
        });

        assert_eq!(seen.recv().await.into_value(), Some(Some(spawned)));
    }

    #[test]
    fn test_task_state_parked_on_channel() {
        let channel = Channel::<u8>::unbuffered().id();
        assert!(TaskState::BlockedOnSend(channel).is_parked_on_channel());
        assert!(TaskState::BlockedOnReceive(channel).is_parked_on_channel());
        assert!(TaskState::BlockedOnSelect(vec![channel]).is_parked_on_channel());
        assert!(!TaskState::BlockedOnTimer.is_parked_on_channel());
        assert!(!TaskState::Runnable.is_parked_on_channel());
    }

    #[test]
    fn test_task_state_display() {
        let a = Channel::<u8>::unbuffered().id();
        let b = Channel::<u8>::unbuffered().id();
        let rendered = TaskState::BlockedOnSelect(vec![a, b]).to_string();
        assert_eq!(rendered, format!("blocked on select over [{}, {}]", a, b));
    }
}
