//! Channels
//!
//! A [`Channel`] is a closable FIFO with a fixed capacity. Capacity 0 is a
//! synchronous handoff: a send completes only once a receiver has taken the
//! value. Receivers observe closure through [`Recv::Closed`], never through an
//! error, and keep observing it forever once the channel is drained.
//!
//! Receivers pull. A waiting receiver only leaves a waker behind; values that
//! cannot be buffered wait in the channel as pending puts, each tagged with the
//! claim of the operation that owns it. Taking a pending put commits its
//! claim, which is how a select learns that one of its send arms fired and how
//! a stale put left by a finished select is recognised and dropped.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::errors::TrySendError;
use crate::task::{self, TaskRecord, TaskState};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_WAITER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_waiter_id() -> u64 {
    NEXT_WAITER_ID.fetch_add(1, Ordering::Relaxed)
}

// ----------------------------------------------------------------------------
// Public Types
// ----------------------------------------------------------------------------

/// Stable identity of a channel, shared by all of its handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Outcome of a receive: a value, or the closed sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recv<T> {
    Value(T),
    Closed,
}

impl<T> Recv<T> {
    pub fn is_closed(&self) -> bool {
        matches!(self, Recv::Closed)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Recv::Value(_))
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Recv::Value(value) => Some(value),
            Recv::Closed => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Recv<U> {
        match self {
            Recv::Value(value) => Recv::Value(f(value)),
            Recv::Closed => Recv::Closed,
        }
    }
}

impl<T> From<Recv<T>> for Option<T> {
    fn from(recv: Recv<T>) -> Self {
        recv.into_value()
    }
}

// ----------------------------------------------------------------------------
// Claims
// ----------------------------------------------------------------------------

const OPEN: usize = usize::MAX;

/// Commit flag shared by every arm of one operation. The first arm to commit
/// records its index; all later commits fail.
#[derive(Debug, Clone)]
pub(crate) struct Claim(Arc<AtomicUsize>);

impl Claim {
    pub(crate) fn new() -> Self {
        Claim(Arc::new(AtomicUsize::new(OPEN)))
    }

    pub(crate) fn commit(&self, arm: usize) -> bool {
        self.0
            .compare_exchange(OPEN, arm, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self, arm: usize) {
        let _ = self
            .0
            .compare_exchange(arm, OPEN, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn winner(&self) -> Option<usize> {
        match self.0.load(Ordering::Acquire) {
            OPEN => None,
            arm => Some(arm),
        }
    }

    fn is_open(&self) -> bool {
        self.winner().is_none()
    }
}

// ----------------------------------------------------------------------------
// Channel State
// ----------------------------------------------------------------------------

/// A suspended operation waiting on this channel
struct Waiter {
    id: u64,
    waker: Waker,
    task: Option<Arc<TaskRecord>>,
}

impl Waiter {
    fn new(id: u64, waker: &Waker) -> Self {
        Self {
            id,
            waker: waker.clone(),
            task: task::current_record(),
        }
    }

    fn refresh(&mut self, waker: &Waker) {
        if !self.waker.will_wake(waker) {
            self.waker = waker.clone();
        }
    }

    fn wake(self) {
        if let Some(task) = self.task {
            task.mark_runnable();
        }
        self.waker.wake();
    }
}

/// A value waiting for buffer space or for a receiver
struct PendingPut<T> {
    id: u64,
    arm: usize,
    claim: Claim,
    value: T,
    waiter: Option<Waiter>,
}

struct State<T> {
    buffer: VecDeque<T>,
    puts: VecDeque<PendingPut<T>>,
    takers: Vec<Waiter>,
    closed: bool,
}

impl<T> State<T> {
    fn has_live_put(&self) -> bool {
        self.puts.iter().any(|put| put.claim.is_open())
    }

    /// Pop the oldest put that can still be committed, dropping stale ones
    fn pop_live_put(&mut self, woken: &mut Vec<Waiter>) -> Option<T> {
        while let Some(put) = self.puts.pop_front() {
            if put.claim.commit(put.arm) {
                woken.extend(put.waiter);
                return Some(put.value);
            }
        }
        None
    }

    /// Move pending puts into freed buffer slots
    fn refill(&mut self, capacity: usize, woken: &mut Vec<Waiter>) {
        while self.buffer.len() < capacity {
            match self.pop_live_put(woken) {
                Some(value) => self.buffer.push_back(value),
                None => break,
            }
        }
    }

    fn register_taker(&mut self, id: u64, waker: &Waker) {
        match self.takers.iter_mut().find(|waiter| waiter.id == id) {
            Some(waiter) => waiter.refresh(waker),
            None => self.takers.push(Waiter::new(id, waker)),
        }
    }
}

struct Shared<T> {
    id: ChannelId,
    capacity: usize,
    state: Mutex<State<T>>,
}

pub(crate) enum TakeAttempt<T> {
    Taken(Recv<T>),
    Pending,
    /// The claim was committed by another arm of the same operation
    Lost,
}

pub(crate) enum PutAttempt<T> {
    Done,
    Parked,
    Lost(T),
}

fn wake_all(woken: Vec<Waiter>) {
    for waiter in woken {
        waiter.wake();
    }
}

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

/// Closable, capacity-bounded FIFO shared between tasks.
///
/// Handles are cheap to clone and all refer to the same channel. Dropping
/// handles never closes the channel; its producer closes it explicitly.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Channel")
            .field("id", &self.shared.id)
            .field("capacity", &self.shared.capacity)
            .field("buffered", &state.buffer.len())
            .field("pending_puts", &state.puts.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> Channel<T> {
    /// Create a channel holding up to `capacity` values; 0 means handoff
    pub fn new(capacity: usize) -> Self {
        let id = ChannelId::next();
        trace!(channel = %id, capacity, "channel created");
        Self {
            shared: Arc::new(Shared {
                id,
                capacity,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    puts: VecDeque::new(),
                    takers: Vec::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Create a synchronous handoff channel
    pub fn unbuffered() -> Self {
        Self::new(0)
    }

    pub fn id(&self) -> ChannelId {
        self.shared.id
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of buffered values
    pub fn len(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Send `value`, suspending until it is buffered or taken by a receiver.
    ///
    /// # Panics
    ///
    /// Sending on a closed channel is a programmer error and panics.
    pub fn send(&self, value: T) -> SendFuture<T> {
        SendFuture {
            channel: self.clone(),
            value: Some(value),
            claim: Claim::new(),
            waiter: next_waiter_id(),
            parked: false,
        }
    }

    /// Receive the next value, suspending until one is available or the
    /// channel is closed and drained.
    pub fn recv(&self) -> RecvFuture<T> {
        RecvFuture {
            channel: self.clone(),
            claim: Claim::new(),
            waiter: next_waiter_id(),
        }
    }

    /// Buffer `value` without suspending, failing when no slot is free
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut woken = Vec::new();
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(TrySendError::Closed {
                    channel: self.shared.id,
                    value,
                });
            }
            if state.buffer.len() >= self.shared.capacity || state.has_live_put() {
                return Err(TrySendError::Full {
                    channel: self.shared.id,
                    value,
                });
            }
            state.buffer.push_back(value);
            woken.append(&mut state.takers);
        }
        wake_all(woken);
        Ok(())
    }

    /// Take a value if one is ready right now
    pub fn try_recv(&self) -> Option<Recv<T>> {
        match self.take(&Claim::new(), 0, None) {
            TakeAttempt::Taken(recv) => Some(recv),
            TakeAttempt::Pending | TakeAttempt::Lost => None,
        }
    }

    /// Queue `value` for delivery without suspending the caller.
    ///
    /// The value is handed over like any other send, in FIFO order, but
    /// nobody waits for the handoff.
    ///
    /// # Panics
    ///
    /// Panics if the channel is closed.
    pub fn send_detached(&self, value: T) {
        let _ = self.put(&Claim::new(), 0, value, None);
    }

    /// Close the channel. Values already buffered or parked by earlier sends
    /// are still delivered before receivers see [`Recv::Closed`].
    ///
    /// Closing twice is tolerated: the second call only logs a warning.
    pub fn close(&self) {
        let woken = {
            let mut state = self.shared.state.lock();
            if state.closed {
                drop(state);
                warn!(channel = %self.shared.id, "close on an already closed channel ignored");
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.takers)
        };
        debug!(channel = %self.shared.id, "channel closed");
        wake_all(woken);
    }

    // ------------------------------------------------------------------------
    // Operation primitives shared with select
    // ------------------------------------------------------------------------

    /// Try to take a value on behalf of arm `arm` of the operation owning
    /// `claim`, registering `waiter` when nothing is ready.
    pub(crate) fn take(
        &self,
        claim: &Claim,
        arm: usize,
        waiter: Option<(u64, &Waker)>,
    ) -> TakeAttempt<T> {
        let mut woken = Vec::new();
        let attempt = {
            let mut state = self.shared.state.lock();
            if let Some(value) = state.buffer.pop_front() {
                if !claim.commit(arm) {
                    state.buffer.push_front(value);
                    return TakeAttempt::Lost;
                }
                state.refill(self.shared.capacity, &mut woken);
                TakeAttempt::Taken(Recv::Value(value))
            } else if state.has_live_put() {
                if !claim.commit(arm) {
                    return TakeAttempt::Lost;
                }
                match state.pop_live_put(&mut woken) {
                    Some(value) => TakeAttempt::Taken(Recv::Value(value)),
                    None => {
                        // the only live put belonged to this same operation
                        claim.release(arm);
                        if let Some((id, waker)) = waiter {
                            state.register_taker(id, waker);
                        }
                        TakeAttempt::Pending
                    }
                }
            } else if state.closed {
                if !claim.commit(arm) {
                    return TakeAttempt::Lost;
                }
                TakeAttempt::Taken(Recv::Closed)
            } else {
                if let Some((id, waker)) = waiter {
                    state.register_taker(id, waker);
                }
                TakeAttempt::Pending
            }
        };
        if let TakeAttempt::Taken(Recv::Value(_)) = attempt {
            trace!(channel = %self.shared.id, "value received");
        }
        wake_all(woken);
        attempt
    }

    /// Try to hand `value` over on behalf of arm `arm`; if it cannot be
    /// buffered it is parked as a pending put owned by `claim`.
    pub(crate) fn put(
        &self,
        claim: &Claim,
        arm: usize,
        value: T,
        waiter: Option<(u64, &Waker)>,
    ) -> PutAttempt<T> {
        let (attempt, woken) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                drop(state);
                panic!("send on closed channel {}", self.shared.id);
            }

            if state.buffer.len() < self.shared.capacity && !state.has_live_put() {
                if !claim.commit(arm) {
                    return PutAttempt::Lost(value);
                }
                state.buffer.push_back(value);
                (PutAttempt::Done, std::mem::take(&mut state.takers))
            } else {
                let (id, waiter) = match waiter {
                    Some((id, waker)) => (id, Some(Waiter::new(id, waker))),
                    None => (next_waiter_id(), None),
                };
                state.puts.push_back(PendingPut {
                    id,
                    arm,
                    claim: claim.clone(),
                    value,
                    waiter,
                });
                (PutAttempt::Parked, std::mem::take(&mut state.takers))
            }
        };
        trace!(channel = %self.shared.id, parked = matches!(attempt, PutAttempt::Parked), "value sent");
        wake_all(woken);
        attempt
    }

    /// Point a parked put at a fresh waker
    pub(crate) fn refresh_put(&self, id: u64, waker: &Waker) {
        let mut state = self.shared.state.lock();
        if let Some(put) = state.puts.iter_mut().find(|put| put.id == id) {
            match put.waiter.as_mut() {
                Some(waiter) => waiter.refresh(waker),
                None => put.waiter = Some(Waiter::new(id, waker)),
            }
        }
    }

    /// Drop every registration left by waiter `id`
    pub(crate) fn withdraw(&self, id: u64) {
        let withdrawn: VecDeque<PendingPut<T>> = {
            let mut state = self.shared.state.lock();
            state.takers.retain(|waiter| waiter.id != id);
            let (withdrawn, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut state.puts)
                .into_iter()
                .partition(|put| put.id == id);
            state.puts = kept;
            withdrawn
        };
        // values are dropped outside the lock
        drop(withdrawn);
    }
}

// ----------------------------------------------------------------------------
// Futures
// ----------------------------------------------------------------------------

/// Future returned by [`Channel::send`]
#[must_use = "futures do nothing unless awaited"]
pub struct SendFuture<T> {
    channel: Channel<T>,
    value: Option<T>,
    claim: Claim,
    waiter: u64,
    parked: bool,
}

impl<T> Unpin for SendFuture<T> {}

impl<T> Future for SendFuture<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if this.parked {
            if this.claim.winner().is_some() {
                this.parked = false;
                return Poll::Ready(());
            }
            this.channel.refresh_put(this.waiter, cx.waker());
            task::park(TaskState::BlockedOnSend(this.channel.id()));
            return Poll::Pending;
        }

        let Some(value) = this.value.take() else {
            return Poll::Ready(());
        };
        match this
            .channel
            .put(&this.claim, 0, value, Some((this.waiter, cx.waker())))
        {
            PutAttempt::Done => Poll::Ready(()),
            PutAttempt::Parked => {
                this.parked = true;
                task::park(TaskState::BlockedOnSend(this.channel.id()));
                Poll::Pending
            }
            PutAttempt::Lost(value) => {
                // a private claim is only ever committed by this send
                this.value = Some(value);
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for SendFuture<T> {
    fn drop(&mut self) {
        if self.parked {
            self.channel.withdraw(self.waiter);
        }
    }
}

/// Future returned by [`Channel::recv`]
#[must_use = "futures do nothing unless awaited"]
pub struct RecvFuture<T> {
    channel: Channel<T>,
    claim: Claim,
    waiter: u64,
}

impl<T> Unpin for RecvFuture<T> {}

impl<T> Future for RecvFuture<T> {
    type Output = Recv<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Recv<T>> {
        let this = self.get_mut();
        match this
            .channel
            .take(&this.claim, 0, Some((this.waiter, cx.waker())))
        {
            TakeAttempt::Taken(recv) => Poll::Ready(recv),
            TakeAttempt::Pending | TakeAttempt::Lost => {
                task::park(TaskState::BlockedOnReceive(this.channel.id()));
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for RecvFuture<T> {
    fn drop(&mut self) {
        self.channel.withdraw(self.waiter);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
