//! Ring of `(timestamp, value)` pairs with age-based expiry (`spec.md`
//! §4.2, component C2).
//!
//! Same surface as [`crate::ring::CircularBuffer`] plus `push(t, x)` and
//! `expire_older_than`. Expiry scans from the tail and evicts while the
//! oldest entry is older than `now - duration_ms`; capacity is also bounded,
//! so whichever bound is reached first evicts (mirrored in
//! [`crate::window::TimeWindowFilter`]).

use crate::error::{DspError, DspResult};

/// One `(timestamp_ms, value)` observation.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct TimedSample<T> {
    pub t: f64,
    pub x: T,
}

/// A capacity-bounded ring of timestamped samples with age-based eviction.
#[derive(Clone, Debug)]
pub struct TimeSeriesBuffer<T> {
    data: Vec<TimedSample<T>>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T: Clone + Copy + Default> TimeSeriesBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![TimedSample::default(); capacity.max(1)],
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
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Push unconditionally, overwriting the oldest slot if full (the
    /// capacity bound, independent of the time bound).
    pub fn push(&mut self, t: f64, x: T) {
        let cap = self.data.len();
        self.data[self.head] = TimedSample { t, x };
        self.head = (self.head + 1) % cap;
        if self.count == cap {
            self.tail = (self.tail + 1) % cap;
        } else {
            self.count += 1;
        }
    }

    pub fn peek(&self) -> DspResult<TimedSample<T>> {
        if self.count == 0 {
            return Err(DspError::Empty {
                context: "TimeSeriesBuffer::peek".into(),
            });
        }
        Ok(self.data[self.tail])
    }

    /// Evict every entry whose timestamp is `<= now - duration_ms`, oldest
    /// first, calling `on_evict` for each. Returns the evicted values in
    /// eviction order so the caller (the sliding-window filter) can notify
    /// its reducer policy of each removal.
    pub fn expire_older_than(&mut self, now: f64, duration_ms: f64) -> Vec<TimedSample<T>> {
        let mut evicted = Vec::new();
        let cutoff = now - duration_ms;
        while self.count > 0 && self.data[self.tail].t < cutoff {
            evicted.push(self.data[self.tail]);
            self.tail = (self.tail + 1) % self.data.len();
            self.count -= 1;
        }
        evicted
    }

    pub fn to_vec(&self) -> Vec<TimedSample<T>> {
        let cap = self.data.len();
        (0..self.count)
            .map(|i| self.data[(self.tail + i) % cap])
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedSample<T>> {
        let cap = self.data.len();
        (0..self.count).map(move |i| &self.data[(self.tail + i) % cap])
    }

    pub fn from_vec(&mut self, v: &[TimedSample<T>]) -> DspResult<()> {
        if v.len() > self.data.len() {
            return Err(DspError::InvalidArgument {
                stage: "TimeSeriesBuffer".into(),
                parameter: "buffer".into(),
                reason: format!(
                    "snapshot holds {} elements but capacity is {}",
                    v.len(),
                    self.data.len()
                ),
            });
        }
        self.clear();
        for sample in v {
            self.data[self.head] = *sample;
            self.head = (self.head + 1) % self.data.len();
        }
        self.count = v.len();
        self.tail = 0;
        self.head = v.len() % self.data.len();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_scans_from_tail() {
        let mut b = TimeSeriesBuffer::<f32>::new(8);
        b.push(0.0, 10.0);
        b.push(100.0, 20.0);
        b.push(600.0, 30.0);
        b.push(650.0, 40.0);
        // windowDuration=500ms at t=650: entries older than 150ms evicted.
        let evicted = b.expire_older_than(650.0, 500.0);
        assert_eq!(evicted.len(), 2);
        assert_eq!(b.to_vec().len(), 2);
        assert_eq!(b.to_vec()[0].x, 30.0);
    }

    #[test]
    fn capacity_bound_independent_of_time_bound() {
        let mut b = TimeSeriesBuffer::<f32>::new(2);
        b.push(0.0, 1.0);
        b.push(1.0, 2.0);
        b.push(2.0, 3.0);
        assert_eq!(b.count(), 2);
        assert_eq!(b.to_vec()[0].x, 2.0);
    }

    #[test]
    fn all_expire_when_gap_exceeds_duration() {
        let mut b = TimeSeriesBuffer::<f32>::new(8);
        b.push(0.0, 10.0);
        b.push(100.0, 20.0);
        b.push(200.0, 30.0);
        let evicted = b.expire_older_than(2200.0, 1000.0);
        assert_eq!(evicted.len(), 3);
        assert!(b.is_empty());
    }
}
