//! # stripeq
//!
//! A contention-reducing concurrent queue: a fixed pool of independently locked
//! sub-queues ("shards") presented to callers as one logical queue.
//!
//! ## Features
//!
//! - **Lock sharding**: every shard owns its own mutex, so producers and consumers
//!   touching different shards never contend
//! - **Pluggable placement**: an affinity policy keeps each caller's traffic on a
//!   small set of shards, a uniform policy spreads it evenly
//! - **Randomized retry**: a busy shard is never waited on; the caller draws a new
//!   candidate and tries again
//!
//! ## Trade-offs
//!
//! The queue gives FIFO order *within* a shard only. There is no global ordering,
//! and an item sitting in a rarely selected shard can wait arbitrarily long. Callers
//! that need "block until anything is available" loop on [`MultiQueue::dequeue`].
//!
//! ## Quick Start
//!
//! ```rust
//! use stripeq::{MultiQueue, MultiQueueConfig, SelectionPolicy};
//!
//! let config = MultiQueueConfig::new(1).policy(SelectionPolicy::Uniform);
//! let queue: MultiQueue<u32> = MultiQueue::new(config)?;
//! queue.enqueue(42).map_err(|e| e.kind())?;
//! assert_eq!(queue.dequeue(), Some(42));
//! # Ok::<(), stripeq::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! `MultiQueue<T, S>` is `Send + Sync` whenever the sub-queue type `S` is `Send`.
//! A thread never holds more than one shard lock at a time, which rules out
//! deadlock by construction.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;

pub use crate::config::{MultiQueueConfig, SelectionPolicy};
pub use crate::error::{CapacityError, EnqueueError, Error, Result};
pub use crate::metrics::{MetricsCollector, QueueMetrics};
pub use crate::queue::{
    AffinitySelector, BoundedSubQueue, Caller, CallerId, MultiQueue, Operation, Probe,
    ShardSelector, SubQueue, UniformSelector,
};

/// Common utilities and helper types
pub mod util {
    /// Pads a value to its own cache line so neighbouring shard locks do not
    /// share one.
    #[repr(align(64))]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get a reference to the inner value
        #[inline]
        pub const fn get(&self) -> &T {
            &self.value
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_padded_layout() {
        assert_eq!(core::mem::align_of::<util::CachePadded<u8>>(), 64);
        assert_eq!(core::mem::size_of::<util::CachePadded<u8>>(), 64);
        assert_eq!(*util::CachePadded::new(7).get(), 7);
    }
}
