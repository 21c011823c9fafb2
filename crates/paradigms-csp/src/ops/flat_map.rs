//! Fan-out followed by fan-in

use tracing::debug;

use super::{drain, merge, relay};
use crate::channel::{Channel, Recv};
use crate::task::go;

/// Project every value of `source` into a derived channel and relay all
/// derived channels into one output.
///
/// Each derived channel gets its own forwarding task and its own done signal.
/// Once `source` closes, the output is closed after every done signal has
/// fired. One derived channel is created per source value, duplicates
/// included.
pub fn flat_map<T, U, F>(mut project: F, source: Channel<T>) -> Channel<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Channel<U> + Send + 'static,
{
    let output = Channel::unbuffered();
    let out = output.clone();
    go(async move {
        let mut done = Vec::new();
        while let Recv::Value(value) = source.recv().await {
            let derived = project(value);
            let signal = Channel::<()>::unbuffered();
            done.push(signal.clone());

            let out = out.clone();
            go(async move {
                relay(&derived, &out).await;
                signal.close();
            });
        }

        debug!(output = %out.id(), derived = done.len(), "flat_map source exhausted");
        drain(&merge(done)).await;
        out.close();
    });
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::sleep;
    use std::time::Duration;

    fn delayed(values: Vec<u32>, delay_ms: u64) -> Channel<u32> {
        let channel = Channel::unbuffered();
        let tx = channel.clone();
        go(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            for value in values {
                tx.send(value).await;
            }
            tx.close();
        });
        channel
    }

    fn letters() -> Channel<char> {
        let channel = Channel::unbuffered();
        let tx = channel.clone();
        go(async move {
            tx.send('A').await;
            tx.send('B').await;
            tx.close();
        });
        channel
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_map_collects_every_derived_value() {
        let output = flat_map(
            |letter| match letter {
                'A' => delayed(vec![1, 2], 0),
                _ => delayed(vec![3], 1000),
            },
            letters(),
        );

        let mut received = drain(&output).await;
        received.sort();
        assert_eq!(received, vec![1, 2, 3]);
        assert_eq!(output.recv().await, Recv::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_map_stays_open_while_a_derived_channel_is_pending() {
        let output = flat_map(
            |letter| match letter {
                'A' => delayed(vec![1, 2], 0),
                _ => delayed(vec![3], 1000),
            },
            letters(),
        );

        assert_eq!(output.recv().await, Recv::Value(1));
        assert_eq!(output.recv().await, Recv::Value(2));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!output.is_closed());

        assert_eq!(output.recv().await, Recv::Value(3));
        assert_eq!(output.recv().await, Recv::Closed);
    }

    #[tokio::test]
    async fn test_flat_map_projects_duplicates_separately() {
        let source = Channel::new(2);
        source.send(7u32).await;
        source.send(7u32).await;
        source.close();

        let output = flat_map(
            |n| {
                let derived = Channel::new(1);
                derived.send_detached(n);
                derived.close();
                derived
            },
            source,
        );
        assert_eq!(drain(&output).await, vec![7, 7]);
    }

    #[tokio::test]
    async fn test_flat_map_of_empty_source_closes() {
        let source = Channel::<u32>::unbuffered();
        source.close();
        let output = flat_map(|_| Channel::<u32>::unbuffered(), source);
        assert_eq!(output.recv().await, Recv::Closed);
    }
}
