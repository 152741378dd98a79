//! Shard selection policies
//!
//! A [`ShardSelector`] proposes one candidate shard per attempt. The queue
//! try-locks that candidate and, if it is busy, comes back with the attempt
//! counter bumped. Selectors are pure policy: they never touch a lock and hold
//! no mutable state; randomness comes from the caller through [`Probe`].
//!
//! Two policies ship with the crate:
//!
//! - [`AffinitySelector`] keeps a caller's enqueues in one half of the shard
//!   space (by id parity) and starts its dequeues on a few dedicated "home"
//!   shards before falling back to random ones.
//! - [`UniformSelector`] draws every candidate uniformly from all shards.

use super::caller::CallerId;
use crate::config::{MultiQueueConfig, SelectionPolicy};
use core::fmt;
use rand::rngs::SmallRng;
use rand::Rng;

/// The kind of operation a shard is being selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Push a payload
    Enqueue,
    /// Pop a payload
    Dequeue,
}

/// Everything a selector may consult for one attempt
#[derive(Debug)]
pub struct Probe<'a> {
    caller: CallerId,
    attempt: usize,
    rng: &'a mut SmallRng,
}

impl<'a> Probe<'a> {
    /// Probe for `attempt` (0-based) on behalf of `caller`
    pub fn new(caller: CallerId, attempt: usize, rng: &'a mut SmallRng) -> Self {
        Self { caller, attempt, rng }
    }

    /// Who is asking
    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// How many candidates this operation already went through
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// The caller's own generator
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut *self.rng
    }
}

/// Placement policy for a [`MultiQueue`](crate::MultiQueue)
///
/// Indices returned outside `[0, shard_count)` are reduced modulo the shard
/// count by the queue.
pub trait ShardSelector: fmt::Debug + Send + Sync {
    /// Propose a shard for this attempt
    fn select(&self, op: Operation, probe: &mut Probe<'_>) -> usize;

    /// Whether an empty shard acquired on `attempt` ends a dequeue.
    ///
    /// Returning `false` releases the shard and asks for another candidate.
    fn settles_on_empty(&self, _attempt: usize) -> bool {
        true
    }
}

/// Build the selector a configuration asks for. The configuration must
/// already be validated.
pub(crate) fn from_config(config: &MultiQueueConfig) -> Box<dyn ShardSelector> {
    match config.policy {
        SelectionPolicy::Affinity => Box::new(AffinitySelector::new(config)),
        SelectionPolicy::Uniform => Box::new(UniformSelector::new(config.shard_count)),
    }
}

/// Keeps each caller's traffic on a small set of shards
///
/// Enqueues from even caller ids land in `[0, n/2)`, odd ones in `[n/2, n)`.
/// Dequeues try the caller group's home shards in order, skipping any that
/// are busy or empty, then draw uniformly from all shards.
///
/// # Examples
///
/// ```rust
/// use rand::rngs::SmallRng;
/// use rand::SeedableRng;
/// use stripeq::{AffinitySelector, CallerId, MultiQueueConfig, Operation, Probe, ShardSelector};
///
/// let selector = AffinitySelector::new(&MultiQueueConfig::new(8).shards_per_caller(2));
/// let mut rng = SmallRng::seed_from_u64(1);
///
/// // Caller 1 belongs to group 1, whose home shards are 2 and 3.
/// let caller = CallerId::from_raw(1);
/// assert_eq!(selector.select(Operation::Dequeue, &mut Probe::new(caller, 0, &mut rng)), 2);
/// assert_eq!(selector.select(Operation::Dequeue, &mut Probe::new(caller, 1, &mut rng)), 3);
/// ```
#[derive(Debug, Clone)]
pub struct AffinitySelector {
    shard_count: usize,
    shards_per_caller: usize,
    home_probes: usize,
}

impl AffinitySelector {
    /// Derive the shard partition from a validated configuration
    pub fn new(config: &MultiQueueConfig) -> Self {
        Self {
            shard_count: config.shard_count.max(1),
            shards_per_caller: config.shards_per_caller.clamp(1, config.shard_count.max(1)),
            home_probes: config.effective_home_probes(),
        }
    }

    /// First home shard of `caller`'s group
    pub fn home_base(&self, caller: CallerId) -> usize {
        let groups = self.shard_count / self.shards_per_caller;
        caller.bucket(groups) * self.shards_per_caller
    }

    /// Shard range `caller`'s enqueues are confined to
    pub fn enqueue_range(&self, caller: CallerId) -> core::ops::Range<usize> {
        let half = self.shard_count / 2;
        if half == 0 {
            0..self.shard_count
        } else if caller.bucket(2) == 0 {
            0..half
        } else {
            half..self.shard_count
        }
    }
}

impl ShardSelector for AffinitySelector {
    fn select(&self, op: Operation, probe: &mut Probe<'_>) -> usize {
        match op {
            Operation::Enqueue => {
                let range = self.enqueue_range(probe.caller());
                probe.rng().gen_range(range)
            }
            Operation::Dequeue if probe.attempt() < self.home_probes => {
                self.home_base(probe.caller()) + probe.attempt()
            }
            Operation::Dequeue => probe.rng().gen_range(0..self.shard_count),
        }
    }

    fn settles_on_empty(&self, attempt: usize) -> bool {
        attempt >= self.home_probes
    }
}

/// Draws every candidate uniformly from all shards
#[derive(Debug, Clone)]
pub struct UniformSelector {
    shard_count: usize,
}

impl UniformSelector {
    /// Selector over `shard_count` shards
    pub fn new(shard_count: usize) -> Self {
        Self {
            shard_count: shard_count.max(1),
        }
    }
}

impl ShardSelector for UniformSelector {
    #[inline]
    fn select(&self, _op: Operation, probe: &mut Probe<'_>) -> usize {
        probe.rng().gen_range(0..self.shard_count)
    }
}
