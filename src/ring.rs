//! Fixed-capacity circular buffer over a generic element type (`spec.md`
//! §4.1, component C1).
//!
//! All operations are amortised O(1) and allocate only at construction.
//! Pushing into a full buffer overwrites the oldest element; callers that
//! need the evicted value must `peek()` before pushing, which is exactly
//! what the sliding-window filter in `window.rs` does.

use crate::error::{DspError, DspResult};

/// A fixed-capacity ring over `T`.
///
/// Invariant: `0 <= count <= capacity`. `head` is the next write position;
/// `tail` is the oldest occupied slot.
#[derive(Clone, Debug)]
pub struct CircularBuffer<T> {
    data: Vec<T>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T: Clone + Default> CircularBuffer<T> {
    /// Create a new buffer with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Push unconditionally, overwriting the oldest slot if full.
    #[inline]
    pub fn push(&mut self, x: T) {
        let cap = self.data.len();
        self.data[self.head] = x;
        self.head = (self.head + 1) % cap;
        if self.count == cap {
            // buffer was already full: the slot we just overwrote was `tail`.
            self.tail = (self.tail + 1) % cap;
        } else {
            self.count += 1;
        }
    }

    /// Peek at the oldest element without removing it. Used by the
    /// sliding-window filter to read the value about to be evicted *before*
    /// `push` overwrites it.
    pub fn peek(&self) -> DspResult<T> {
        if self.count == 0 {
            return Err(DspError::Empty {
                context: "CircularBuffer::peek".into(),
            });
        }
        Ok(self.data[self.tail].clone())
    }

    /// The most recently pushed element, or `None` if empty.
    pub fn newest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.head + self.data.len() - 1) % self.data.len();
        Some(self.data[idx].clone())
    }

    /// Copy out the logical contents, oldest first. Used for snapshotting.
    pub fn to_vec(&self) -> Vec<T> {
        let cap = self.data.len();
        (0..self.count)
            .map(|i| self.data[(self.tail + i) % cap].clone())
            .collect()
    }

    /// Iterate the logical contents, oldest first, without allocating a
    /// fresh `Vec`.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let cap = self.data.len();
        (0..self.count).map(move |i| &self.data[(self.tail + i) % cap])
    }

    /// Clear and repopulate from a vector in oldest-to-newest order. Used to
    /// restore a snapshot.
    pub fn from_vec(&mut self, v: &[T]) -> DspResult<()> {
        if v.len() > self.data.len() {
            return Err(DspError::InvalidArgument {
                stage: "CircularBuffer".into(),
                parameter: "buffer".into(),
                reason: format!(
                    "snapshot holds {} elements but capacity is {}",
                    v.len(),
                    self.data.len()
                ),
            });
        }
        self.clear();
        for x in v {
            self.data[self.head] = x.clone();
            self.head = (self.head + 1) % self.data.len();
        }
        self.count = v.len();
        self.tail = 0;
        self.head = v.len() % self.data.len();
        Ok(())
    }

    /// Reset to empty without reallocating.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}
