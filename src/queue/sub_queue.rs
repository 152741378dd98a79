//! Single-shard FIFO contract
//!
//! A [`SubQueue`] performs no synchronization of its own. The owning
//! [`MultiQueue`](crate::MultiQueue) only ever touches one through the shard's
//! mutex guard, which is what `&mut self` encodes here.

use crate::CapacityError;
use std::collections::VecDeque;

/// FIFO storage behind one shard lock
pub trait SubQueue<T> {
    /// Append `item` at the back, or hand it back if the shard is full
    fn push_back(&mut self, item: T) -> Result<(), CapacityError<T>>;

    /// Remove the item at the front
    fn pop_front(&mut self) -> Option<T>;

    /// Whether the shard holds no items
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items in the shard
    fn len(&self) -> usize;
}

/// Unbounded shards. Push never fails.
impl<T> SubQueue<T> for VecDeque<T> {
    #[inline]
    fn push_back(&mut self, item: T) -> Result<(), CapacityError<T>> {
        VecDeque::push_back(self, item);
        Ok(())
    }

    #[inline]
    fn pop_front(&mut self) -> Option<T> {
        VecDeque::pop_front(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        VecDeque::is_empty(self)
    }

    #[inline]
    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}

/// A shard with a fixed capacity
///
/// # Examples
///
/// ```rust
/// use stripeq::{BoundedSubQueue, SubQueue};
///
/// let mut shard = BoundedSubQueue::new(1);
/// assert!(shard.push_back("a").is_ok());
/// assert_eq!(shard.push_back("b").unwrap_err().into_inner(), "b");
/// assert_eq!(shard.pop_front(), Some("a"));
/// ```
#[derive(Debug, Clone)]
pub struct BoundedSubQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedSubQueue<T> {
    /// Create an empty shard holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another push would be rejected
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }
}

impl<T> SubQueue<T> for BoundedSubQueue<T> {
    fn push_back(&mut self, item: T) -> Result<(), CapacityError<T>> {
        if self.is_full() {
            return Err(CapacityError(item));
        }
        self.items.push_back(item);
        Ok(())
    }

    fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
