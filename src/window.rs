//! Generic sliding-window engine combining a buffer with a reducer policy
//! (`spec.md` §4.4, component C4).
//!
//! Two variants, selected at construction: sample-count mode over
//! [`crate::ring::CircularBuffer`] and time-based mode over
//! [`crate::timeseries::TimeSeriesBuffer`]. An instance may carry both a
//! sample-count capacity and a `window_duration_ms`; whichever bound is
//! reached first evicts.

use crate::error::{DspError, DspResult};
use crate::numeric::Float;
use crate::reducer::{ReducerAggregate, ReducerPolicy};
use crate::ring::CircularBuffer;
use crate::timeseries::TimeSeriesBuffer;

/// Recompute the aggregate from the buffer's current contents and compare
/// to the stored aggregate within the tolerance `spec.md` §4.3/§4.11
/// specify (`10⁻⁴ · max(1, |aggregate|)`), for every field both sides
/// populate. Only policies that "admit it" (sum, sum-of-squares,
/// sum-of-abs, count) carry a field a recomputation can check; policies
/// that export nothing comparable (e.g. z-score's transient `last` value)
/// simply have no fields to compare and this is a no-op.
fn validate_aggregate<T: Float, P: ReducerPolicy<T>>(
    buffer: &[T],
    stored: &ReducerAggregate,
) -> DspResult<()> {
    let recomputed = P::recompute(buffer);
    let fields: [(&str, Option<f64>, Option<f64>); 4] = [
        ("runningSum", stored.running_sum, recomputed.running_sum),
        (
            "runningSumOfSquares",
            stored.running_sum_of_squares,
            recomputed.running_sum_of_squares,
        ),
        (
            "runningSumOfAbs",
            stored.running_sum_of_abs,
            recomputed.running_sum_of_abs,
        ),
        (
            "count",
            stored.count.map(|c| c as f64),
            recomputed.count.map(|c| c as f64),
        ),
    ];
    for (field, stored_value, recomputed_value) in fields {
        if let (Some(a), Some(b)) = (stored_value, recomputed_value) {
            if !ReducerAggregate::approx_eq(a, b) {
                return Err(DspError::StateCorrupted {
                    index: 0,
                    channel: 0,
                    field: field.into(),
                    reason: format!(
                        "stored aggregate {a} disagrees with recomputed {b} beyond tolerance"
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Sample-count windowed filter: evicts by capacity alone.
#[derive(Clone)]
pub struct CountWindowFilter<T: Float, P: ReducerPolicy<T>> {
    buffer: CircularBuffer<T>,
    policy: P,
}

impl<T: Float + Default, P: ReducerPolicy<T>> CountWindowFilter<T, P> {
    pub fn new(window_size: usize, policy: P) -> Self {
        Self {
            buffer: CircularBuffer::new(window_size),
            policy,
        }
    }

    pub fn window_size(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn count(&self) -> usize {
        self.buffer.count()
    }

    /// Push one sample and return the policy's result after the insertion
    /// (and any eviction this insertion triggers).
    pub fn push(&mut self, x: T) -> T {
        if self.buffer.is_full() {
            if let Ok(evicted) = self.buffer.peek() {
                self.policy.on_remove(evicted);
            }
        }
        self.buffer.push(x);
        self.policy.on_add(x);
        self.policy.read(self.buffer.count())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.policy.clear();
    }

    pub fn buffer_snapshot(&self) -> Vec<T> {
        self.buffer.to_vec()
    }

    pub fn aggregate_snapshot(&self) -> ReducerAggregate {
        self.policy.export()
    }

    pub fn restore(&mut self, buffer: &[T], aggregate: &ReducerAggregate) -> DspResult<()> {
        validate_aggregate::<T, P>(buffer, aggregate)?;
        self.buffer.from_vec(buffer)?;
        self.policy.import(aggregate);
        Ok(())
    }
}

/// Time-based windowed filter: evicts by elapsed time, with an optional
/// capacity ceiling as a secondary bound.
#[derive(Clone)]
pub struct TimeWindowFilter<T: Float + Copy, P: ReducerPolicy<T>> {
    buffer: TimeSeriesBuffer<T>,
    policy: P,
    window_duration_ms: f64,
}

impl<T: Float + Copy + Default, P: ReducerPolicy<T>> TimeWindowFilter<T, P> {
    pub fn new(capacity: usize, window_duration_ms: f64, policy: P) -> Self {
        Self {
            buffer: TimeSeriesBuffer::new(capacity),
            policy,
            window_duration_ms,
        }
    }

    pub fn window_duration_ms(&self) -> f64 {
        self.window_duration_ms
    }

    pub fn count(&self) -> usize {
        self.buffer.count()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Grow the backing capacity without losing buffered data, used when a
    /// stage re-estimates the time-window capacity from observed sample
    /// rate (`spec.md` §4.10).
    pub fn grow_capacity(&mut self, new_capacity: usize) {
        if new_capacity <= self.buffer.capacity() {
            return;
        }
        let contents = self.buffer.to_vec();
        let mut grown = TimeSeriesBuffer::new(new_capacity);
        for s in contents {
            grown.push(s.t, s.x);
        }
        self.buffer = grown;
    }

    /// Push one `(t, x)` observation: evict all aged-out entries first
    /// (notifying the policy of each removal), then insert and read.
    pub fn push(&mut self, t: f64, x: T) -> T {
        for evicted in self.buffer.expire_older_than(t, self.window_duration_ms) {
            self.policy.on_remove(evicted.x);
        }
        if self.buffer.capacity() > 0 && self.buffer.count() == self.buffer.capacity() {
            if let Ok(evicted) = self.buffer.peek() {
                self.policy.on_remove(evicted.x);
            }
        }
        self.buffer.push(t, x);
        self.policy.on_add(x);
        self.policy.read(self.buffer.count())
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.policy.clear();
    }

    pub fn buffer_snapshot(&self) -> Vec<(f64, T)> {
        self.buffer.iter().map(|s| (s.t, s.x)).collect()
    }

    pub fn aggregate_snapshot(&self) -> ReducerAggregate {
        self.policy.export()
    }

    pub fn restore(&mut self, buffer: &[(f64, T)], aggregate: &ReducerAggregate) -> DspResult<()> {
        let values: Vec<T> = buffer.iter().map(|&(_, x)| x).collect();
        validate_aggregate::<T, P>(&values, aggregate)?;
        let samples: Vec<crate::timeseries::TimedSample<T>> = buffer
            .iter()
            .map(|&(t, x)| crate::timeseries::TimedSample { t, x })
            .collect();
        self.buffer.from_vec(&samples)?;
        self.policy.import(aggregate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::MeanPolicy;

    #[test]
    fn moving_average_window_size_3() {
        let mut f = CountWindowFilter::<f32, MeanPolicy>::new(3, MeanPolicy::default());
        let out: Vec<f32> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&x| f.push(x))
            .collect();
        assert_eq!(out, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn time_based_average_holds_all_within_window() {
        let mut f = TimeWindowFilter::<f32, MeanPolicy>::new(64, 1000.0, MeanPolicy::default());
        f.push(0.0, 10.0);
        f.push(100.0, 20.0);
        let last = f.push(200.0, 30.0);
        assert_eq!(last, 20.0);
        let after_gap = f.push(2200.0, 100.0);
        assert_eq!(after_gap, 100.0);
    }

    #[test]
    fn time_based_average_irregular_timestamps() {
        let mut f = TimeWindowFilter::<f32, MeanPolicy>::new(64, 500.0, MeanPolicy::default());
        let ts = [0.0, 50.0, 600.0, 650.0];
        let xs = [10.0f32, 20.0, 30.0, 40.0];
        let out: Vec<f32> = ts.iter().zip(xs).map(|(&t, x)| f.push(t, x)).collect();
        assert_eq!(out, vec![10.0, 15.0, 30.0, 35.0]);
    }

    #[test]
    fn tampered_aggregate_fails_validation_on_restore() {
        let mut f = CountWindowFilter::<f32, MeanPolicy>::new(3, MeanPolicy::default());
        f.push(1.0);
        f.push(2.0);
        let buf = f.buffer_snapshot();
        let mut tampered = f.aggregate_snapshot();
        tampered.running_sum = Some(tampered.running_sum.unwrap() + 1000.0);

        let mut g = CountWindowFilter::<f32, MeanPolicy>::new(3, MeanPolicy::default());
        assert!(matches!(
            g.restore(&buf, &tampered),
            Err(crate::error::DspError::StateCorrupted { .. })
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_next_output() {
        let mut f = CountWindowFilter::<f32, MeanPolicy>::new(3, MeanPolicy::default());
        f.push(1.0);
        f.push(2.0);
        let buf = f.buffer_snapshot();
        let agg = f.aggregate_snapshot();

        let mut g = CountWindowFilter::<f32, MeanPolicy>::new(3, MeanPolicy::default());
        g.restore(&buf, &agg).unwrap();

        assert_eq!(f.push(3.0), g.push(3.0));
    }
}
