//! Integration tests for sliding-window filters and snapshot restore
//! (`spec.md` §4.4, §4.11).

use dspflow::error::DspError;
use dspflow::reducer::{MeanPolicy, RmsPolicy};
use dspflow::window::{CountWindowFilter, TimeWindowFilter};

#[test]
fn count_window_emits_one_value_per_push() {
    let mut filter = CountWindowFilter::<f32, MeanPolicy>::new(4, MeanPolicy::default());
    let input = [1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let output: Vec<f32> = input.iter().map(|&x| filter.push(x)).collect();
    assert_eq!(output.len(), input.len());
    // Once the window is full, eviction keeps only the newest 4 values.
    assert_eq!(output[5], (3.0 + 4.0 + 5.0 + 6.0) / 4.0);
}

#[test]
fn count_window_rms_matches_naive_over_the_trailing_window() {
    let mut filter = CountWindowFilter::<f32, RmsPolicy>::new(3, RmsPolicy::default());
    let input = [3.0_f32, 4.0, 0.0, 12.0, 5.0];
    let mut last = 0.0_f32;
    for &x in &input {
        last = filter.push(x);
    }
    let naive = ((12.0f32).powi(2) + (5.0f32).powi(2) + (0.0f32).powi(2)).sqrt() / (3.0f32).sqrt();
    assert!((last - naive).abs() < 1e-3);
}

#[test]
fn time_window_evicts_entries_outside_the_duration() {
    let mut filter = TimeWindowFilter::<f32, MeanPolicy>::new(32, 100.0, MeanPolicy::default());
    filter.push(0.0, 10.0);
    filter.push(50.0, 20.0);
    assert_eq!(filter.count(), 2);
    // This push is more than 100ms after the first sample, which should
    // age it out.
    filter.push(150.0, 30.0);
    assert_eq!(filter.count(), 2);
}

#[test]
fn restore_round_trip_preserves_future_output() {
    let mut original = CountWindowFilter::<f32, MeanPolicy>::new(4, MeanPolicy::default());
    for x in [1.0_f32, 2.0, 3.0] {
        original.push(x);
    }
    let buffer = original.buffer_snapshot();
    let aggregate = original.aggregate_snapshot();

    let mut restored = CountWindowFilter::<f32, MeanPolicy>::new(4, MeanPolicy::default());
    restored.restore(&buffer, &aggregate).unwrap();

    assert_eq!(original.push(4.0), restored.push(4.0));
}

#[test]
fn restore_rejects_a_tampered_aggregate() {
    let mut original = CountWindowFilter::<f32, MeanPolicy>::new(4, MeanPolicy::default());
    for x in [1.0_f32, 2.0, 3.0] {
        original.push(x);
    }
    let buffer = original.buffer_snapshot();
    let mut aggregate = original.aggregate_snapshot();
    aggregate.running_sum = Some(aggregate.running_sum.unwrap() * 10.0);

    let mut restored = CountWindowFilter::<f32, MeanPolicy>::new(4, MeanPolicy::default());
    let result = restored.restore(&buffer, &aggregate);
    assert!(matches!(result, Err(DspError::StateCorrupted { .. })));
}

#[test]
fn time_window_restore_round_trip_preserves_future_output() {
    let mut original = TimeWindowFilter::<f32, MeanPolicy>::new(16, 1000.0, MeanPolicy::default());
    original.push(0.0, 1.0);
    original.push(100.0, 2.0);
    let buffer = original.buffer_snapshot();
    let aggregate = original.aggregate_snapshot();

    let mut restored = TimeWindowFilter::<f32, MeanPolicy>::new(16, 1000.0, MeanPolicy::default());
    restored.restore(&buffer, &aggregate).unwrap();

    assert_eq!(original.push(200.0, 3.0), restored.push(200.0, 3.0));
}
