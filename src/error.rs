//! Error types for stripeq operations

use core::fmt;
use thiserror::Error;

/// Main error type for queue construction and operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The shard configuration was rejected at construction time
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The selected shard is at capacity
    #[error("shard is at capacity")]
    Capacity,

    /// No shard lock could be acquired before the deadline
    #[error("timed out waiting for a free shard")]
    Timeout,
}

/// Result type for stripeq operations
pub type Result<T> = core::result::Result<T, Error>;

/// A sub-queue refused a push and handed the payload back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CapacityError<T>(pub T);

impl<T> CapacityError<T> {
    /// Recover the rejected payload
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapacityError(..)")
    }
}

impl<T> fmt::Display for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Error::Capacity, f)
    }
}

impl<T> std::error::Error for CapacityError<T> {}

/// A failed enqueue. The payload is never dropped on an error path; it comes
/// back to the caller here.
#[derive(Clone, PartialEq, Eq)]
pub struct EnqueueError<T> {
    kind: Error,
    payload: T,
}

impl<T> EnqueueError<T> {
    pub(crate) fn new(kind: Error, payload: T) -> Self {
        Self { kind, payload }
    }

    /// Why the enqueue failed
    pub fn kind(&self) -> Error {
        self.kind.clone()
    }

    /// Recover the payload that was not enqueued
    pub fn into_inner(self) -> T {
        self.payload
    }

    /// Split into the failure kind and the payload
    pub fn into_parts(self) -> (Error, T) {
        (self.kind, self.payload)
    }
}

impl<T> From<CapacityError<T>> for EnqueueError<T> {
    fn from(err: CapacityError<T>) -> Self {
        Self::new(Error::Capacity, err.0)
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue failed: {}", self.kind)
    }
}

impl<T> std::error::Error for EnqueueError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
