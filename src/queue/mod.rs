//! Sharded queue implementation
//!
//! ## Building Blocks
//!
//! - [`SubQueue`]: FIFO storage for one shard, unsynchronized
//! - [`ShardSelector`]: placement policy proposing a shard per attempt
//! - [`Caller`]: registered caller identity plus its own random generator
//! - [`MultiQueue`]: the shards, their locks and the retry loop
//!
//! ## Choosing a Policy
//!
//! | Policy | Enqueue | Dequeue | Locality | Load spread |
//! |--------|---------|---------|----------|-------------|
//! | Affinity | half of the shards, by caller parity | home shards, then random | High | Depends on callers |
//! | Uniform | any shard | any shard | None | Even in expectation |
//!
//! ## Examples
//!
//! ```rust
//! use stripeq::{MultiQueue, MultiQueueConfig, SelectionPolicy};
//!
//! // Four shards holding at most 128 payloads each
//! let config = MultiQueueConfig::new(4).policy(SelectionPolicy::Uniform);
//! let queue = MultiQueue::bounded(config, 128)?;
//! queue.enqueue("hello").map_err(|e| e.kind())?;
//! assert_eq!(queue.len(), 1);
//! # Ok::<(), stripeq::Error>(())
//! ```

pub mod caller;
pub mod multi;
pub mod selector;
pub mod sub_queue;

pub use caller::{Caller, CallerId};
pub use multi::MultiQueue;
pub use selector::{AffinitySelector, Operation, Probe, ShardSelector, UniformSelector};
pub use sub_queue::{BoundedSubQueue, SubQueue};


#[cfg(test)]
mod proptests;
