//! Sharded Multi-Queue
//!
//! [`MultiQueue`] spreads payloads over a fixed array of shards, each a
//! sub-queue behind its own mutex. An operation asks the selector for a
//! candidate shard and *try*-locks it; a busy shard is never waited on, the
//! caller backs off briefly and asks for a different candidate instead.
//!
//! ```text
//! enqueue/dequeue
//!       |
//!       v
//!  select(op, caller, attempt) --> try_lock(shard) --busy--> backoff, attempt += 1
//!                                        |
//!                                     acquired
//!                                        |
//!                              push_back / pop_front, unlock
//! ```
//!
//! ## Guarantees
//!
//! - At most one shard lock is held by a thread at any time, so the queue
//!   cannot deadlock
//! - Operations serialized through one shard observe FIFO order
//! - Nothing else: there is no order across shards, and a payload in a shard
//!   the selector rarely picks can wait indefinitely
//!
//! Contention is not an error. Without a deadline the retry loop is
//! unbounded; the `*_timeout` variants give up with [`Error::Timeout`].

use super::caller::{self, Caller};
use super::selector::{self, Operation, Probe, ShardSelector};
use super::sub_queue::{BoundedSubQueue, SubQueue};
use crate::config::{MultiQueueConfig, SelectionPolicy};
use crate::metrics::{AtomicMetrics, MetricsCollector, Outcome, QueueMetrics};
use crate::util::CachePadded;
use crate::{EnqueueError, Error, Result};
use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};
use crossbeam_utils::Backoff;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Result of one selection attempt
enum SelectionOutcome<'a, S> {
    /// The candidate's lock is now held
    Acquired(usize, MutexGuard<'a, S>),
    /// The candidate was busy; pick another
    Retry,
}

/// A shard lock won by the retry loop
struct Acquired<'a, S> {
    index: usize,
    attempt: usize,
    guard: MutexGuard<'a, S>,
}

/// A concurrent queue made of independently locked shards
///
/// # Type Parameters
///
/// * `T` - The payload type. Payloads are moved in and out, never cloned.
/// * `S` - The per-shard storage, [`VecDeque<T>`] (unbounded) by default
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use stripeq::{MultiQueue, MultiQueueConfig};
///
/// let queue: Arc<MultiQueue<usize>> = Arc::new(MultiQueue::new(MultiQueueConfig::default())?);
///
/// let producers: Vec<_> = (0..4)
///     .map(|p| {
///         let queue = Arc::clone(&queue);
///         thread::spawn(move || {
///             for i in 0..100 {
///                 queue.enqueue(p * 100 + i).unwrap();
///             }
///         })
///     })
///     .collect();
/// for producer in producers {
///     producer.join().unwrap();
/// }
///
/// assert_eq!(queue.len(), 400);
/// let mut all = queue.drain();
/// all.sort_unstable();
/// assert_eq!(all, (0..400).collect::<Vec<_>>());
/// # Ok::<(), stripeq::Error>(())
/// ```
pub struct MultiQueue<T, S = VecDeque<T>> {
    shards: Box<[CachePadded<Mutex<S>>]>,
    config: MultiQueueConfig,
    selector: Box<dyn ShardSelector>,
    metrics: AtomicMetrics,
    metrics_enabled: AtomicBool,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T, S> MultiQueue<T, S>
where
    S: SubQueue<T> + Default,
{
    /// Create a queue with empty default shards
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration is invalid. No shard is
    /// allocated in that case.
    pub fn new(config: MultiQueueConfig) -> Result<Self> {
        Self::with_sub_queues(config, |_| S::default())
    }
}

impl<T> MultiQueue<T, BoundedSubQueue<T>> {
    /// Create a queue whose shards each hold at most `capacity` payloads
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration is invalid or `capacity` is 0.
    pub fn bounded(config: MultiQueueConfig, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("shard capacity must be at least 1".into()));
        }
        Self::with_sub_queues(config, |_| BoundedSubQueue::new(capacity))
    }
}

impl<T, S> MultiQueue<T, S>
where
    S: SubQueue<T>,
{
    /// Create a queue, building shard `i` with `make(i)`
    pub fn with_sub_queues<F>(config: MultiQueueConfig, make: F) -> Result<Self>
    where
        F: FnMut(usize) -> S,
    {
        config.validate()?;
        let selector = selector::from_config(&config);
        Ok(Self::build(config, selector, make))
    }

    /// Create a queue driven by a custom selection policy
    ///
    /// Only the shard counts are validated; the partition rule and the
    /// `policy` field of `config` belong to the built-in selectors and are
    /// ignored.
    pub fn with_selector<P, F>(config: MultiQueueConfig, selector: P, make: F) -> Result<Self>
    where
        P: ShardSelector + 'static,
        F: FnMut(usize) -> S,
    {
        config.clone().policy(SelectionPolicy::Uniform).validate()?;
        Ok(Self::build(config, Box::new(selector), make))
    }

    fn build<F>(config: MultiQueueConfig, selector: Box<dyn ShardSelector>, mut make: F) -> Self
    where
        F: FnMut(usize) -> S,
    {
        let shards = (0..config.shard_count)
            .map(|index| CachePadded::new(Mutex::new(make(index))))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        tracing::debug!(
            shard_count = config.shard_count,
            shards_per_caller = config.shards_per_caller,
            ?selector,
            "multi-queue initialized"
        );

        Self {
            shards,
            metrics_enabled: AtomicBool::new(config.metrics),
            config,
            selector,
            metrics: AtomicMetrics::default(),
            _payload: PhantomData,
        }
    }

    /// Append `payload` to one shard, chosen for the calling thread
    ///
    /// # Errors
    ///
    /// [`Error::Capacity`] if the chosen shard is full. The payload comes back
    /// inside the error and no other shard is tried.
    pub fn enqueue(&self, payload: T) -> core::result::Result<(), EnqueueError<T>> {
        caller::with_current(|caller| self.enqueue_inner(caller, payload, None))
    }

    /// [`enqueue`](Self::enqueue) on behalf of an explicit caller
    pub fn enqueue_as(&self, caller: &mut Caller, payload: T) -> core::result::Result<(), EnqueueError<T>> {
        self.enqueue_inner(caller, payload, None)
    }

    /// [`enqueue`](Self::enqueue), giving up with [`Error::Timeout`] if no shard
    /// lock is won within `timeout`
    ///
    /// A `timeout` too large to represent as a deadline means no deadline.
    pub fn enqueue_timeout(&self, payload: T, timeout: Duration) -> core::result::Result<(), EnqueueError<T>> {
        let deadline = Instant::now().checked_add(timeout);
        caller::with_current(|caller| self.enqueue_inner(caller, payload, deadline))
    }

    /// Remove a payload from the shard the selector settles on
    ///
    /// `None` means the settled shard was empty, not that the whole queue is.
    /// Callers waiting for data loop on this.
    pub fn dequeue(&self) -> Option<T> {
        caller::with_current(|caller| self.dequeue_inner(caller, None)).unwrap_or(None)
    }

    /// [`dequeue`](Self::dequeue) on behalf of an explicit caller
    pub fn dequeue_as(&self, caller: &mut Caller) -> Option<T> {
        self.dequeue_inner(caller, None).unwrap_or(None)
    }

    /// [`dequeue`](Self::dequeue), giving up with [`Error::Timeout`] if no shard
    /// lock is won within `timeout`
    ///
    /// A `timeout` too large to represent as a deadline means no deadline.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        let deadline = Instant::now().checked_add(timeout);
        caller::with_current(|caller| self.dequeue_inner(caller, deadline))
    }

    fn enqueue_inner(
        &self,
        caller: &mut Caller,
        payload: T,
        deadline: Option<Instant>,
    ) -> core::result::Result<(), EnqueueError<T>> {
        let start = self.start_timer();
        let mut attempt = 0;
        let mut acquired = match self.acquire(Operation::Enqueue, caller, &mut attempt, deadline) {
            Ok(acquired) => acquired,
            Err(kind) => {
                self.record(Outcome::TimedOut, start);
                return Err(EnqueueError::new(kind, payload));
            }
        };

        let pushed = acquired.guard.push_back(payload);
        drop(acquired.guard);
        match pushed {
            Ok(()) => {
                self.record(Outcome::Enqueued, start);
                Ok(())
            }
            Err(rejected) => {
                tracing::debug!(shard = acquired.index, "shard at capacity, enqueue rejected");
                self.record(Outcome::Rejected, start);
                Err(rejected.into())
            }
        }
    }

    fn dequeue_inner(&self, caller: &mut Caller, deadline: Option<Instant>) -> Result<Option<T>> {
        let start = self.start_timer();
        let mut attempt = 0;
        loop {
            let mut acquired = match self.acquire(Operation::Dequeue, caller, &mut attempt, deadline) {
                Ok(acquired) => acquired,
                Err(kind) => {
                    self.record(Outcome::TimedOut, start);
                    return Err(kind);
                }
            };

            let popped = acquired.guard.pop_front();
            drop(acquired.guard);
            if let Some(payload) = popped {
                self.record(Outcome::Dequeued, start);
                return Ok(Some(payload));
            }

            if self.selector.settles_on_empty(acquired.attempt) {
                self.record(Outcome::Empty, start);
                return Ok(None);
            }
            tracing::trace!(shard = acquired.index, attempt = acquired.attempt, "home shard empty, moving on");
            attempt = acquired.attempt + 1;
        }
    }

    /// Win one shard lock, reselecting on every busy candidate
    fn acquire(
        &self,
        op: Operation,
        caller: &mut Caller,
        attempt: &mut usize,
        deadline: Option<Instant>,
    ) -> Result<Acquired<'_, S>> {
        let backoff = Backoff::new();
        loop {
            let id = caller.id();
            let index = {
                let mut probe = Probe::new(id, *attempt, caller.rng_mut());
                self.selector.select(op, &mut probe)
            };

            match self.try_shard(index) {
                SelectionOutcome::Acquired(index, guard) => {
                    return Ok(Acquired {
                        index,
                        attempt: *attempt,
                        guard,
                    });
                }
                SelectionOutcome::Retry => {
                    if self.is_metrics_enabled() {
                        self.metrics.record_contention();
                    }
                    tracing::trace!(shard = index, attempt = *attempt, ?op, "shard busy, reselecting");
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            tracing::warn!(?op, attempts = *attempt + 1, "no free shard before deadline");
                            return Err(Error::Timeout);
                        }
                    }
                    *attempt += 1;
                    backoff.snooze();
                }
            }
        }
    }

    #[inline]
    fn try_shard(&self, index: usize) -> SelectionOutcome<'_, S> {
        // Custom selectors are clamped rather than trusted.
        let index = index % self.shards.len();
        match self.shards[index].get().try_lock() {
            Some(guard) => SelectionOutcome::Acquired(index, guard),
            None => SelectionOutcome::Retry,
        }
    }

    /// Number of payloads in shard `index`, or `None` if there is no such shard
    pub fn shard_len(&self, index: usize) -> Option<usize> {
        self.shards.get(index).map(|shard| shard.get().lock().len())
    }

    /// Total payloads across all shards
    ///
    /// Shards are counted one lock at a time, so under concurrent use this is
    /// a snapshot rather than an exact figure.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.get().lock().len()).sum()
    }

    /// Whether every shard was empty when visited
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.get().lock().is_empty())
    }

    /// Take every payload, shard by shard in index order, keeping per-shard
    /// FIFO order
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            let mut guard = shard.get().lock();
            while let Some(payload) = guard.pop_front() {
                out.push(payload);
            }
        }
        out
    }

    /// Number of shards, fixed at construction
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shards dedicated to each caller group
    pub fn shards_per_caller(&self) -> usize {
        self.config.shards_per_caller
    }

    /// The configured built-in policy
    pub fn policy(&self) -> SelectionPolicy {
        self.config.policy
    }

    /// The configuration this queue was built from
    pub fn config(&self) -> &MultiQueueConfig {
        &self.config
    }

    #[inline]
    fn start_timer(&self) -> Option<Instant> {
        self.is_metrics_enabled().then(Instant::now)
    }

    #[inline]
    fn record(&self, outcome: Outcome, start: Option<Instant>) {
        if let Some(start) = start {
            self.metrics.record(outcome, start.elapsed());
        }
    }
}

impl<T, S> MetricsCollector for MultiQueue<T, S> {
    fn metrics(&self) -> QueueMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }
}

impl<T, S> fmt::Debug for MultiQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiQueue")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl<T, S> Drop for MultiQueue<T, S> {
    fn drop(&mut self) {
        tracing::debug!(shard_count = self.shards.len(), "multi-queue torn down");
    }
}
