//! Incremental aggregators for the sliding-window filter (`spec.md` §3 and
//! §4.3, component C3).
//!
//! Each policy owns the minimal scalar state needed for an O(1) update.
//! `on_remove(x)` must exactly invert a prior `on_add(x)` — any asymmetry
//! would let error accumulate unboundedly over a long stream, which is
//! exactly what the snapshot-validation tolerance in `pipeline.rs` is
//! designed to catch.
//!
//! Accumulators are kept in `f64` internally regardless of the external
//! sample scalar type `T`, mirroring the double-precision accumulation rule
//! the SIMD primitives already use for sum-of-squares (`spec.md` §4.5,
//! §9 "Numerical precision").

use crate::numeric::Float;
use serde::{Deserialize, Serialize};

/// A reducer policy: an incremental aggregator plus the function that turns
/// it into a scalar result.
pub trait ReducerPolicy<T: Float>: Clone {
    fn on_add(&mut self, x: T);
    fn on_remove(&mut self, x: T);
    fn clear(&mut self);
    /// Compute the result from the current aggregate and the number of
    /// elements currently in the window.
    fn read(&self, count: usize) -> T;
    /// Export the aggregate(s) under stable field names for the snapshot
    /// document (`runningSum`, `runningSumOfSquares`, `runningSumOfAbs`,
    /// `count`).
    fn export(&self) -> ReducerAggregate;
    fn import(&mut self, state: &ReducerAggregate);
    /// Recompute the aggregate from scratch given the buffer's current
    /// contents, for snapshot-validation (`spec.md` §4.3/§4.11).
    fn recompute(values: &[T]) -> ReducerAggregate
    where
        Self: Sized;
}

/// The aggregate fields a policy may export, named to match the snapshot
/// wire schema exactly.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ReducerAggregate {
    #[serde(rename = "runningSum", skip_serializing_if = "Option::is_none")]
    pub running_sum: Option<f64>,
    #[serde(rename = "runningSumOfSquares", skip_serializing_if = "Option::is_none")]
    pub running_sum_of_squares: Option<f64>,
    #[serde(rename = "runningSumOfAbs", skip_serializing_if = "Option::is_none")]
    pub running_sum_of_abs: Option<f64>,
    #[serde(rename = "count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl ReducerAggregate {
    /// Relative-tolerance comparison used by snapshot validation:
    /// `|a - b| <= 1e-4 * max(1, |a|)`.
    pub fn approx_eq(a: f64, b: f64) -> bool {
        let tol = 1e-4 * a.abs().max(1.0);
        (a - b).abs() <= tol
    }
}

/// `Σxᵢ`, result = mean.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanPolicy {
    sum: f64,
}

impl<T: Float> ReducerPolicy<T> for MeanPolicy {
    fn on_add(&mut self, x: T) {
        self.sum += x.to_f64();
    }
    fn on_remove(&mut self, x: T) {
        self.sum -= x.to_f64();
    }
    fn clear(&mut self) {
        self.sum = 0.0;
    }
    fn read(&self, count: usize) -> T {
        if count == 0 {
            T::zero()
        } else {
            T::from_f64(self.sum / count as f64)
        }
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(self.sum),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum = state.running_sum.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(values.iter().map(|v| v.to_f64()).sum()),
            ..Default::default()
        }
    }
}

/// `Σxᵢ²`, result = √max(0, Σxᵢ²/count).
#[derive(Clone, Copy, Debug, Default)]
pub struct RmsPolicy {
    sum_sq: f64,
}

impl<T: Float> ReducerPolicy<T> for RmsPolicy {
    fn on_add(&mut self, x: T) {
        let v = x.to_f64();
        self.sum_sq += v * v;
    }
    fn on_remove(&mut self, x: T) {
        let v = x.to_f64();
        self.sum_sq -= v * v;
    }
    fn clear(&mut self) {
        self.sum_sq = 0.0;
    }
    fn read(&self, count: usize) -> T {
        if count == 0 {
            return T::zero();
        }
        let mean_sq = (self.sum_sq / count as f64).max(0.0);
        T::from_f64(mean_sq.sqrt())
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum_of_squares: Some(self.sum_sq),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum_sq = state.running_sum_of_squares.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        ReducerAggregate {
            running_sum_of_squares: Some(values.iter().map(|v| v.to_f64().powi(2)).sum()),
            ..Default::default()
        }
    }
}

/// `Σ|xᵢ|`, result = mean absolute value.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanAbsPolicy {
    sum_abs: f64,
}

impl<T: Float> ReducerPolicy<T> for MeanAbsPolicy {
    fn on_add(&mut self, x: T) {
        self.sum_abs += x.to_f64().abs();
    }
    fn on_remove(&mut self, x: T) {
        self.sum_abs -= x.to_f64().abs();
    }
    fn clear(&mut self) {
        self.sum_abs = 0.0;
    }
    fn read(&self, count: usize) -> T {
        if count == 0 {
            T::zero()
        } else {
            T::from_f64(self.sum_abs / count as f64)
        }
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum_of_abs: Some(self.sum_abs),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum_abs = state.running_sum_of_abs.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        ReducerAggregate {
            running_sum_of_abs: Some(values.iter().map(|v| v.to_f64().abs()).sum()),
            ..Default::default()
        }
    }
}

/// `Σxᵢ, Σxᵢ²`, result = `max(0, Σxᵢ²/count - (Σxᵢ/count)²)`. The clamp
/// absorbs floating-point negative drift and is mandatory per `spec.md` §3.
#[derive(Clone, Copy, Debug, Default)]
pub struct VariancePolicy {
    sum: f64,
    sum_sq: f64,
}

impl VariancePolicy {
    fn variance(&self, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let n = count as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }
}

impl<T: Float> ReducerPolicy<T> for VariancePolicy {
    fn on_add(&mut self, x: T) {
        let v = x.to_f64();
        self.sum += v;
        self.sum_sq += v * v;
    }
    fn on_remove(&mut self, x: T) {
        let v = x.to_f64();
        self.sum -= v;
        self.sum_sq -= v * v;
    }
    fn clear(&mut self) {
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
    fn read(&self, count: usize) -> T {
        T::from_f64(self.variance(count))
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(self.sum),
            running_sum_of_squares: Some(self.sum_sq),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum = state.running_sum.unwrap_or(0.0);
        self.sum_sq = state.running_sum_of_squares.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        let sum: f64 = values.iter().map(|v| v.to_f64()).sum();
        let sum_sq: f64 = values.iter().map(|v| v.to_f64().powi(2)).sum();
        ReducerAggregate {
            running_sum: Some(sum),
            running_sum_of_squares: Some(sum_sq),
            ..Default::default()
        }
    }
}

/// `(x - μ) / σ`, 0 when `σ < ε`. Holds the same state as [`VariancePolicy`]
/// plus the epsilon and the last-seen raw value, since `read` needs the
/// *current* sample, not just the aggregate.
#[derive(Clone, Copy, Debug)]
pub struct ZScorePolicy {
    sum: f64,
    sum_sq: f64,
    epsilon: f64,
    last: f64,
}

impl ZScorePolicy {
    pub fn new(epsilon: f64) -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
            epsilon,
            last: 0.0,
        }
    }
}

impl Default for ZScorePolicy {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<T: Float> ReducerPolicy<T> for ZScorePolicy {
    fn on_add(&mut self, x: T) {
        let v = x.to_f64();
        self.sum += v;
        self.sum_sq += v * v;
        self.last = v;
    }
    fn on_remove(&mut self, x: T) {
        let v = x.to_f64();
        self.sum -= v;
        self.sum_sq -= v * v;
    }
    fn clear(&mut self) {
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.last = 0.0;
    }
    fn read(&self, count: usize) -> T {
        if count == 0 {
            return T::zero();
        }
        let n = count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let sigma = variance.sqrt();
        if sigma < self.epsilon {
            T::zero()
        } else {
            T::from_f64((self.last - mean) / sigma)
        }
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(self.sum),
            running_sum_of_squares: Some(self.sum_sq),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum = state.running_sum.unwrap_or(0.0);
        self.sum_sq = state.running_sum_of_squares.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        let sum: f64 = values.iter().map(|v| v.to_f64()).sum();
        let sum_sq: f64 = values.iter().map(|v| v.to_f64().powi(2)).sum();
        ReducerAggregate {
            running_sum: Some(sum),
            running_sum_of_squares: Some(sum_sq),
            ..Default::default()
        }
    }
}

/// `Σxᵢ`, result = the running sum itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumPolicy {
    sum: f64,
}

impl<T: Float> ReducerPolicy<T> for SumPolicy {
    fn on_add(&mut self, x: T) {
        self.sum += x.to_f64();
    }
    fn on_remove(&mut self, x: T) {
        self.sum -= x.to_f64();
    }
    fn clear(&mut self) {
        self.sum = 0.0;
    }
    fn read(&self, _count: usize) -> T {
        T::from_f64(self.sum)
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(self.sum),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.sum = state.running_sum.unwrap_or(0.0);
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        ReducerAggregate {
            running_sum: Some(values.iter().map(|v| v.to_f64()).sum()),
            ..Default::default()
        }
    }
}

/// Count of "true" flags (non-zero input treated as boolean), result =
/// the count itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterPolicy {
    count: i64,
}

impl<T: Float> ReducerPolicy<T> for CounterPolicy {
    fn on_add(&mut self, x: T) {
        if x.to_f64() != 0.0 {
            self.count += 1;
        }
    }
    fn on_remove(&mut self, x: T) {
        if x.to_f64() != 0.0 {
            self.count -= 1;
        }
    }
    fn clear(&mut self) {
        self.count = 0;
    }
    fn read(&self, _count: usize) -> T {
        T::from_f64(self.count as f64)
    }
    fn export(&self) -> ReducerAggregate {
        ReducerAggregate {
            count: Some(self.count.max(0) as u64),
            ..Default::default()
        }
    }
    fn import(&mut self, state: &ReducerAggregate) {
        self.count = state.count.unwrap_or(0) as i64;
    }
    fn recompute(values: &[T]) -> ReducerAggregate {
        ReducerAggregate {
            count: Some(values.iter().filter(|v| v.to_f64() != 0.0).count() as u64),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_clamps_to_zero_for_constant_signal() {
        let mut p = VariancePolicy::default();
        for _ in 0..5 {
            ReducerPolicy::<f32>::on_add(&mut p, 3.0f32);
        }
        let r: f32 = ReducerPolicy::<f32>::read(&p, 5);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn zscore_returns_zero_below_epsilon() {
        let mut p = ZScorePolicy::new(1e-6);
        for _ in 0..5 {
            ReducerPolicy::<f32>::on_add(&mut p, 7.0f32);
        }
        let r: f32 = ReducerPolicy::<f32>::read(&p, 5);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn on_add_on_remove_are_inverses() {
        let mut p = MeanPolicy::default();
        ReducerPolicy::<f32>::on_add(&mut p, 5.0f32);
        ReducerPolicy::<f32>::on_add(&mut p, 3.0f32);
        ReducerPolicy::<f32>::on_remove(&mut p, 5.0f32);
        let r: f32 = ReducerPolicy::<f32>::read(&p, 1);
        assert_eq!(r, 3.0);
    }

    #[test]
    fn recompute_matches_export_after_adds() {
        let mut p = RmsPolicy::default();
        let values = [1.0f32, 2.0, 3.0, 4.0];
        for &v in &values {
            ReducerPolicy::<f32>::on_add(&mut p, v);
        }
        let exported = ReducerPolicy::<f32>::export(&p);
        let recomputed = <RmsPolicy as ReducerPolicy<f32>>::recompute(&values);
        assert!(ReducerAggregate::approx_eq(
            exported.running_sum_of_squares.unwrap(),
            recomputed.running_sum_of_squares.unwrap()
        ));
    }
}
