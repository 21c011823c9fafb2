//! Select (alts)
//!
//! [`Alts`] races several channel operations and completes exactly one of
//! them. Each arm maps its own outcome into a common output type, which lets a
//! data channel race a timer channel of a different element type.
//!
//! Tie-break rule: every time the select is polled its arms are tried in a
//! freshly shuffled order (uniform permutation from `fastrand`) and the first
//! ready arm in that order wins. List order carries no priority. Seeding the
//! scheduler makes the choice reproducible. Losing arms are left untouched:
//! no value is taken from, or handed to, their channels.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use tracing::trace;

use crate::channel::{next_waiter_id, Channel, ChannelId, Claim, PutAttempt, Recv, TakeAttempt};
use crate::task::{self, TaskState};

// ----------------------------------------------------------------------------
// Result Type
// ----------------------------------------------------------------------------

/// The arm that fired: its position in the request list, its channel, and the
/// value its mapping produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<O> {
    pub index: usize,
    pub channel: ChannelId,
    pub value: O,
}

// ----------------------------------------------------------------------------
// Arms
// ----------------------------------------------------------------------------

enum ArmPoll<O> {
    Ready(O),
    Pending,
    Lost,
}

trait Arm<O>: Send {
    fn channel(&self) -> ChannelId;

    fn attempt(&mut self, claim: &Claim, index: usize, waiter: u64, waker: &Waker)
        -> ArmPoll<O>;

    /// Output of a send arm whose parked value was taken by a receiver
    fn completed(&mut self) -> Option<O>;

    fn withdraw(&mut self, waiter: u64);
}

struct RecvArm<T, F> {
    channel: Channel<T>,
    map: Option<F>,
}

impl<T, O, F> Arm<O> for RecvArm<T, F>
where
    T: Send,
    F: FnOnce(Recv<T>) -> O + Send,
{
    fn channel(&self) -> ChannelId {
        self.channel.id()
    }

    fn attempt(&mut self, claim: &Claim, index: usize, waiter: u64, waker: &Waker) -> ArmPoll<O> {
        match self.channel.take(claim, index, Some((waiter, waker))) {
            TakeAttempt::Taken(recv) => match self.map.take() {
                Some(map) => ArmPoll::Ready(map(recv)),
                None => ArmPoll::Pending,
            },
            TakeAttempt::Pending => ArmPoll::Pending,
            TakeAttempt::Lost => ArmPoll::Lost,
        }
    }

    fn completed(&mut self) -> Option<O> {
        None
    }

    fn withdraw(&mut self, waiter: u64) {
        self.channel.withdraw(waiter);
    }
}

struct SendArm<T, F> {
    channel: Channel<T>,
    value: Option<T>,
    map: Option<F>,
}

impl<T, O, F> Arm<O> for SendArm<T, F>
where
    T: Send,
    F: FnOnce() -> O + Send,
{
    fn channel(&self) -> ChannelId {
        self.channel.id()
    }

    fn attempt(&mut self, claim: &Claim, index: usize, waiter: u64, waker: &Waker) -> ArmPoll<O> {
        let Some(value) = self.value.take() else {
            // already parked; keep the waker current
            self.channel.refresh_put(waiter, waker);
            return ArmPoll::Pending;
        };
        match self.channel.put(claim, index, value, Some((waiter, waker))) {
            PutAttempt::Done => match self.map.take() {
                Some(map) => ArmPoll::Ready(map()),
                None => ArmPoll::Pending,
            },
            PutAttempt::Parked => ArmPoll::Pending,
            PutAttempt::Lost(value) => {
                self.value = Some(value);
                ArmPoll::Lost
            }
        }
    }

    fn completed(&mut self) -> Option<O> {
        self.map.take().map(|map| map())
    }

    fn withdraw(&mut self, waiter: u64) {
        self.channel.withdraw(waiter);
    }
}

// ----------------------------------------------------------------------------
// Alts
// ----------------------------------------------------------------------------

/// Builder and future for a select over receive and send operations.
///
/// ```ignore
/// let raced = Alts::new()
///     .recv(&movies, Race::Movie)
///     .recv(&timer, |_| Race::TimedOut)
///     .await;
/// ```
///
/// A select with no arms never resolves.
#[must_use = "futures do nothing unless awaited"]
pub struct Alts<'a, O> {
    arms: Vec<Box<dyn Arm<O> + 'a>>,
    claim: Claim,
    waiter: u64,
    finished: bool,
}

impl<'a, O> Default for Alts<'a, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, O> Alts<'a, O> {
    pub fn new() -> Self {
        Self {
            arms: Vec::new(),
            claim: Claim::new(),
            waiter: next_waiter_id(),
            finished: false,
        }
    }

    /// Race a receive on `channel`; `map` turns its outcome into the output
    pub fn recv<T, F>(mut self, channel: &Channel<T>, map: F) -> Self
    where
        T: Send + 'a,
        F: FnOnce(Recv<T>) -> O + Send + 'a,
    {
        self.arms.push(Box::new(RecvArm {
            channel: channel.clone(),
            map: Some(map),
        }));
        self
    }

    /// Race a send of `value` on `channel`; `map` produces the output if the
    /// send is the arm that completes.
    ///
    /// # Panics
    ///
    /// Polling panics if `channel` is closed.
    pub fn send<T, F>(mut self, channel: &Channel<T>, value: T, map: F) -> Self
    where
        T: Send + 'a,
        F: FnOnce() -> O + Send + 'a,
    {
        self.arms.push(Box::new(SendArm {
            channel: channel.clone(),
            value: Some(value),
            map: Some(map),
        }));
        self
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    fn finish(&mut self, index: usize, value: O) -> Selected<O> {
        self.finished = true;
        for arm in &mut self.arms {
            arm.withdraw(self.waiter);
        }
        let channel = self.arms[index].channel();
        trace!(arm = index, channel = %channel, "select resolved");
        Selected {
            index,
            channel,
            value,
        }
    }
}

impl<'a, O> Future for Alts<'a, O> {
    type Output = Selected<O>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Selected<O>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Pending;
        }

        loop {
            if let Some(index) = this.claim.winner() {
                // a receiver took the value parked by one of our send arms
                if let Some(value) = this.arms[index].completed() {
                    return Poll::Ready(this.finish(index, value));
                }
            }

            let mut order: Vec<usize> = (0..this.arms.len()).collect();
            fastrand::shuffle(&mut order);

            let mut lost = false;
            for index in order {
                match this.arms[index].attempt(&this.claim, index, this.waiter, cx.waker()) {
                    ArmPoll::Ready(value) => return Poll::Ready(this.finish(index, value)),
                    ArmPoll::Pending => {}
                    ArmPoll::Lost => {
                        lost = true;
                        break;
                    }
                }
            }

            if !lost {
                let channels = this.arms.iter().map(|arm| arm.channel()).collect();
                task::park(TaskState::BlockedOnSelect(channels));
                return Poll::Pending;
            }
        }
    }
}

impl<'a, O> Drop for Alts<'a, O> {
    fn drop(&mut self) {
        if !self.finished {
            for arm in &mut self.arms {
                arm.withdraw(self.waiter);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::go;
    use crate::timer::timeout;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Race {
        Data(Recv<u32>),
        TimedOut,
    }

    #[tokio::test(start_paused = true)]
    async fn test_preloaded_data_beats_pending_timer() {
        let data = Channel::new(1);
        data.send(7).await;
        let timer = timeout(Duration::from_millis(500));

        let selected = Alts::new()
            .recv(&data, Race::Data)
            .recv(&timer, |_| Race::TimedOut)
            .await;

        assert_eq!(selected.index, 0);
        assert_eq!(selected.channel, data.id());
        assert_eq!(selected.value, Race::Data(Recv::Value(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_timer_beats_empty_data() {
        let data = Channel::<u32>::unbuffered();
        let timer = timeout(Duration::from_millis(500));

        let selected = Alts::new()
            .recv(&data, Race::Data)
            .recv(&timer, |_| Race::TimedOut)
            .await;

        assert_eq!(selected.index, 1);
        assert_eq!(selected.channel, timer.id());
        assert_eq!(selected.value, Race::TimedOut);
    }

    #[tokio::test]
    async fn test_closed_arm_reports_sentinel() {
        let data = Channel::<u32>::unbuffered();
        data.close();
        let selected = Alts::new().recv(&data, Race::Data).await;
        assert_eq!(selected.value, Race::Data(Recv::Closed));
    }

    #[tokio::test]
    async fn test_losing_arm_keeps_its_value() {
        let a = Channel::new(1);
        let b = Channel::new(1);
        a.send("a").await;
        b.send("b").await;

        let selected = Alts::new()
            .recv(&a, |recv| recv.into_value())
            .recv(&b, |recv| recv.into_value())
            .await;

        let (winner, loser) = if selected.index == 0 { (&a, &b) } else { (&b, &a) };
        assert_eq!(selected.channel, winner.id());
        assert_eq!(winner.len(), 0);
        assert_eq!(loser.len(), 1);
    }

    #[tokio::test]
    async fn test_simultaneous_ties_pick_every_arm_eventually() {
        fastrand::seed(7);
        let mut wins = [0usize; 3];
        for _ in 0..64 {
            let channels: Vec<Channel<usize>> = (0..3).map(|_| Channel::new(1)).collect();
            for (i, channel) in channels.iter().enumerate() {
                channel.send(i).await;
            }
            let selected = channels
                .iter()
                .fold(Alts::new(), |alts, channel| alts.recv(channel, |recv| recv.into_value()))
                .await;
            assert_eq!(selected.value, Some(selected.index));
            wins[selected.index] += 1;
        }
        assert!(wins.iter().all(|&count| count > 0), "wins: {:?}", wins);
    }

    #[tokio::test]
    async fn test_send_arm_completes_when_receiver_takes() {
        let out = Channel::<u32>::unbuffered();
        let idle = Channel::<u32>::unbuffered();

        let rx = out.clone();
        let results = Channel::new(1);
        let tx = results.clone();
        go(async move {
            tx.send(rx.recv().await).await;
        });

        let selected = Alts::new()
            .send(&out, 11, || "sent")
            .recv(&idle, |_| "received")
            .await;

        assert_eq!(selected.index, 0);
        assert_eq!(selected.value, "sent");
        assert_eq!(results.recv().await, Recv::Value(Recv::Value(11)));
    }

    #[tokio::test]
    async fn test_send_arm_into_free_buffer_is_immediate() {
        let out = Channel::new(1);
        let selected = Alts::new().send(&out, 3, || ()).await;
        assert_eq!(selected.channel, out.id());
        assert_eq!(out.try_recv(), Some(Recv::Value(3)));
    }

    #[tokio::test]
    async fn test_losing_send_arm_is_withdrawn() {
        let out = Channel::<u32>::unbuffered();
        let ready = Channel::new(1);
        ready.send(1).await;

        // the send arm can only park, so the ready receive must win
        let selected = Alts::new()
            .send(&out, 99, || 0)
            .recv(&ready, |recv| recv.into_value().unwrap_or_default())
            .await;
        assert_eq!(selected.index, 1);

        out.close();
        assert_eq!(out.recv().await, Recv::Closed);
    }
}
