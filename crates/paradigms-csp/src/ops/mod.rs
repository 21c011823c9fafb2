//! Channel combinators
//!
//! Every operator here returns its output channel immediately and fills it
//! from tasks it spawns with [`go`](crate::go). Outputs are unbuffered and are
//! closed exactly once, by the operator that created them.

mod flat_map;
mod merge;

pub use flat_map::flat_map;
pub use merge::merge;

use tracing::debug;

use crate::channel::{Channel, Recv};
use crate::task::go;

/// Forward every value of `from` into `to` until `from` closes
pub(crate) async fn relay<T>(from: &Channel<T>, to: &Channel<T>) {
    while let Recv::Value(value) = from.recv().await {
        to.send(value).await;
    }
}

/// Spawn a task relaying `from` into `to`, closing `to` afterwards when `close`
/// is set
pub fn pipe<T>(from: &Channel<T>, to: &Channel<T>, close: bool)
where
    T: Send + 'static,
{
    let from = from.clone();
    let to = to.clone();
    go(async move {
        relay(&from, &to).await;
        debug!(from = %from.id(), to = %to.id(), close, "pipe source exhausted");
        if close {
            to.close();
        }
    });
}

/// Channel of `f(v)` for every value of `source`; closes when `source` closes
pub fn map<T, U, F>(mut f: F, source: Channel<T>) -> Channel<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    let output = Channel::unbuffered();
    let out = output.clone();
    go(async move {
        while let Recv::Value(value) = source.recv().await {
            out.send(f(value)).await;
        }
        out.close();
    });
    output
}

/// Receive every value until the closed sentinel
pub async fn drain<T>(channel: &Channel<T>) -> Vec<T> {
    let mut values = Vec::new();
    while let Recv::Value(value) = channel.recv().await {
        values.push(value);
    }
    values
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
