//! Integration tests for the incremental reducer policies (`spec.md` §4.3).

use dspflow::reducer::{
    CounterPolicy, MeanAbsPolicy, MeanPolicy, ReducerPolicy, RmsPolicy, SumPolicy, VariancePolicy,
    ZScorePolicy,
};

fn relative_close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(1.0)
}

#[test]
fn mean_policy_matches_naive_average_over_a_stream() {
    let data = [3.0_f32, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
    let mut policy = MeanPolicy::default();
    for (i, &x) in data.iter().enumerate() {
        policy.on_add(x);
        let naive: f32 = data[..=i].iter().sum::<f32>() / (i + 1) as f32;
        let got: f32 = ReducerPolicy::<f32>::read(&policy, i + 1);
        assert!(relative_close(naive as f64, got as f64, 1e-4));
    }
}

#[test]
fn rms_policy_matches_naive_rms() {
    let data = [1.0_f32, -2.0, 3.0, -4.0, 5.0];
    let mut policy = RmsPolicy::default();
    for &x in &data {
        policy.on_add(x);
    }
    let naive = (data.iter().map(|x| x * x).sum::<f32>() / data.len() as f32).sqrt();
    let got: f32 = policy.read(data.len());
    assert!(relative_close(naive as f64, got as f64, 1e-4));
}

#[test]
fn mean_abs_policy_matches_naive_mean_of_abs() {
    let data = [1.0_f32, -2.0, 3.0, -4.0];
    let mut policy = MeanAbsPolicy::default();
    for &x in &data {
        policy.on_add(x);
    }
    let naive = data.iter().map(|x| x.abs()).sum::<f32>() / data.len() as f32;
    let got: f32 = policy.read(data.len());
    assert!(relative_close(naive as f64, got as f64, 1e-4));
}

#[test]
fn variance_policy_never_goes_negative() {
    // A run of identical samples drives the variance estimator's naive
    // floating-point formula slightly below zero without the spec's
    // mandatory max(0, ·) clamp.
    let mut policy = VariancePolicy::default();
    for _ in 0..64 {
        policy.on_add(2.5_f32);
    }
    let v: f32 = policy.read(64);
    assert!(v >= 0.0);
}

#[test]
fn variance_policy_on_add_on_remove_is_symmetric() {
    let mut policy = VariancePolicy::default();
    let data = [1.0_f32, 2.0, 3.0, 4.0, 5.0];
    for &x in &data {
        policy.on_add(x);
    }
    for &x in &data {
        policy.on_remove(x);
    }
    let v: f32 = policy.read(0);
    assert!(v.abs() < 1e-3);
}

#[test]
fn z_score_policy_tracks_deviation_from_the_running_mean() {
    let mut policy = ZScorePolicy::new(1e-6);
    let data = [1.0_f32, 2.0, 3.0, 4.0, 100.0];
    let mut last = 0.0_f32;
    for (i, &x) in data.iter().enumerate() {
        policy.on_add(x);
        last = policy.read(i + 1);
    }
    // The outlier should produce a much larger magnitude z-score than the
    // steady early samples did.
    assert!(last.abs() > 1.0);
}

#[test]
fn sum_and_counter_policies_are_exact() {
    let mut sum = SumPolicy::default();
    let mut counter = CounterPolicy::default();
    for x in [1.0_f32, 2.0, 3.0, 4.0] {
        sum.on_add(x);
        counter.on_add(x);
    }
    assert_eq!(ReducerPolicy::<f32>::read(&sum, 4), 10.0);
    assert_eq!(ReducerPolicy::<f32>::read(&counter, 4), 4.0);
    sum.on_remove(4.0);
    counter.on_remove(4.0);
    assert_eq!(ReducerPolicy::<f32>::read(&sum, 3), 6.0);
    assert_eq!(ReducerPolicy::<f32>::read(&counter, 3), 3.0);
}

#[test]
fn recompute_matches_incremental_accumulation() {
    let data = [5.0_f32, -3.0, 2.5, 7.0, -1.0];
    let mut policy = MeanPolicy::default();
    for &x in &data {
        policy.on_add(x);
    }
    let incremental = policy.export();
    let recomputed = MeanPolicy::recompute(&data);
    assert_eq!(incremental.running_sum, recomputed.running_sum);
}
