//! Error types for the CSP core
//!
//! Channel traffic itself never fails: a receive on an exhausted channel yields
//! the closed sentinel, and sending on a closed channel is a programmer error
//! that panics. The types here cover the non-blocking send variant and
//! scheduler construction.

use std::fmt;

use crate::channel::ChannelId;

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

/// Errors surfaced while constructing the scheduler
#[derive(Debug, thiserror::Error)]
pub enum CspError {
    #[error("Failed to build scheduler runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type CspResult<T> = core::result::Result<T, CspError>;

// ----------------------------------------------------------------------------
// Non-blocking Send Errors
// ----------------------------------------------------------------------------

/// Returned by [`Channel::try_send`](crate::Channel::try_send); hands the value back
#[derive(Debug, PartialEq, Eq)]
pub enum TrySendError<T> {
    Full { channel: ChannelId, value: T },
    Closed { channel: ChannelId, value: T },
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full { channel, .. } => {
                write!(f, "Channel {} has no free buffer slot", channel)
            }
            TrySendError::Closed { channel, .. } => write!(f, "Channel {} is closed", channel),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendError<T> {}

impl<T> TrySendError<T> {
    /// Recover the value that could not be sent
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full { value, .. } | TrySendError::Closed { value, .. } => value,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TrySendError::Closed { .. })
    }
}
