//! Caller identity and per-caller randomness
//!
//! Affinity selection needs a small, stable number per caller. Native thread
//! handles are neither small nor dense, so callers are registered instead: the
//! first operation on a thread takes the next id from a process-wide counter.
//! Selectors reduce ids into `[0, shard_count)` before using them as indices.
//!
//! The calling thread's caller is taken out of thread-local storage for the
//! length of one operation. A nested operation on the same thread (a custom
//! selector or sub-queue calling back into a queue) or one running during
//! thread teardown gets a temporary caller with the same id instead.
//!
//! Every caller also owns its random generator. Nothing in the crate touches a
//! shared generator, and a [`Caller`] built with [`Caller::with_seed`] replays
//! the same shard choices on every run.

use core::sync::atomic::{AtomicUsize, Ordering};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cell::Cell;

static NEXT_CALLER_ID: AtomicUsize = AtomicUsize::new(0);

/// Registered identity of a queue caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(usize);

impl CallerId {
    /// Take the next unused id
    pub fn register() -> Self {
        Self(NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Use a caller-chosen id. Any value is accepted; selectors never index
    /// with it directly.
    pub const fn from_raw(id: usize) -> Self {
        Self(id)
    }

    /// The raw id
    pub const fn get(self) -> usize {
        self.0
    }

    /// Reduce the id into `[0, buckets)`
    #[inline]
    pub fn bucket(self, buckets: usize) -> usize {
        debug_assert!(buckets > 0);
        self.0 % buckets
    }
}

/// Per-caller state threaded through shard selection
#[derive(Debug)]
pub struct Caller {
    id: CallerId,
    rng: SmallRng,
}

impl Caller {
    /// Register a new caller with an entropy-seeded generator
    pub fn new() -> Self {
        Self::with_entropy(CallerId::register())
    }

    fn with_entropy(id: CallerId) -> Self {
        Self {
            id,
            rng: SmallRng::from_entropy(),
        }
    }

    /// A caller with a fixed identity and a reproducible generator
    pub fn with_seed(id: CallerId, seed: u64) -> Self {
        Self {
            id,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// This caller's identity
    pub fn id(&self) -> CallerId {
        self.id
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

impl Default for Caller {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT: Cell<Option<Caller>> = const { Cell::new(None) };
    static CURRENT_ID: Cell<Option<CallerId>> = const { Cell::new(None) };
}

/// Run `f` with the calling thread's registered caller
pub(crate) fn with_current<R>(f: impl FnOnce(&mut Caller) -> R) -> R {
    let mut caller = CURRENT
        .try_with(Cell::take)
        .ok()
        .flatten()
        .unwrap_or_else(|| Caller::with_entropy(current_id()));
    let result = f(&mut caller);
    // Fails only during thread teardown, where the caller is simply dropped.
    let _ = CURRENT.try_with(|slot| slot.set(Some(caller)));
    result
}

/// Identity the calling thread uses for implicit operations
///
/// A thread whose storage is already torn down gets a fresh id per call.
pub fn current_id() -> CallerId {
    CURRENT_ID
        .try_with(|slot| match slot.get() {
            Some(id) => id,
            None => {
                let id = CallerId::register();
                slot.set(Some(id));
                id
            }
        })
        .unwrap_or_else(|_| CallerId::register())
}
