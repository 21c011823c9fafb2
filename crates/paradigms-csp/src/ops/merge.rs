//! Fan-in

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::relay;
use crate::channel::Channel;
use crate::task::go;

/// Relay every value of every input into one output channel.
///
/// Values appear in the order they become available; per-input order is kept.
/// One forwarding task runs per input and the last one to finish closes the
/// output. Merging no channels yields an already closed output.
pub fn merge<T, I>(inputs: I) -> Channel<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Channel<T>>,
{
    let inputs: Vec<Channel<T>> = inputs.into_iter().collect();
    let output = Channel::unbuffered();

    if inputs.is_empty() {
        output.close();
        return output;
    }

    debug!(output = %output.id(), inputs = inputs.len(), "merge started");
    let remaining = Arc::new(AtomicUsize::new(inputs.len()));
    for input in inputs {
        let out = output.clone();
        let remaining = remaining.clone();
        go(async move {
            relay(&input, &out).await;
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                debug!(output = %out.id(), "merge inputs exhausted");
                out.close();
            }
        });
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Recv;
    use crate::ops::drain;

    fn from_values<T: Send + 'static>(values: Vec<T>) -> Channel<T> {
        let channel = Channel::unbuffered();
        let tx = channel.clone();
        go(async move {
            for value in values {
                tx.send(value).await;
            }
            tx.close();
        });
        channel
    }

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
    enum Item {
        Number(u32),
        Text(&'static str),
    }

    #[tokio::test]
    async fn test_merge_relays_everything_then_closes() {
        let a = map_items(from_values(vec![1, 2]), Item::Number);
        let b = map_items(from_values(vec!["x"]), Item::Text);

        let merged = merge(vec![a, b]);
        let received = drain(&merged).await;

        let mut sorted = received.clone();
        sorted.sort();
        assert_eq!(sorted, vec![Item::Number(1), Item::Number(2), Item::Text("x")]);

        let one = received.iter().position(|i| *i == Item::Number(1));
        let two = received.iter().position(|i| *i == Item::Number(2));
        assert!(one < two);

        assert_eq!(merged.recv().await, Recv::Closed);
    }

    #[tokio::test]
    async fn test_merge_waits_for_every_input() {
        let open = Channel::<u32>::unbuffered();
        let merged = merge(vec![from_values(vec![1]), open.clone()]);

        assert_eq!(merged.recv().await, Recv::Value(1));
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(!merged.is_closed());

        open.close();
        assert_eq!(merged.recv().await, Recv::Closed);
    }

    #[tokio::test]
    async fn test_merge_of_nothing_is_closed() {
        let merged = merge(Vec::<Channel<u8>>::new());
        assert!(merged.is_closed());
        assert_eq!(merged.recv().await, Recv::Closed);
    }

    fn map_items<T, F>(source: Channel<T>, f: F) -> Channel<Item>
    where
        T: Send + 'static,
        F: FnMut(T) -> Item + Send + 'static,
    {
        crate::ops::map(f, source)
    }
}
