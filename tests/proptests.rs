//! Property-based tests for the "for all" invariants `spec.md` §8 names.

use dspflow::fft::{ComplexSpectrum, FftEngine};
use dspflow::fir::FirKernel;
use dspflow::pipeline::{Pipeline, ProcessOptions, StageSpec};
use dspflow::reducer::{MeanPolicy, ReducerPolicy};
use dspflow::simd;
use dspflow::window::CountWindowFilter;
use proptest::prelude::*;

fn relative_close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(1.0)
}

proptest! {
    /// A full sliding window's exported aggregate round-trips against a
    /// re-accumulation over the exported buffer, within the spec's
    /// tolerance.
    #[test]
    fn mean_aggregate_recompute_round_trips(
        values in prop::collection::vec(-1000.0f32..1000.0, 1..64)
    ) {
        let mut filter = CountWindowFilter::<f32, MeanPolicy>::new(values.len(), MeanPolicy::default());
        for &x in &values {
            filter.push(x);
        }
        let buffer = filter.buffer_snapshot();
        let aggregate = filter.aggregate_snapshot();
        let recomputed = MeanPolicy::recompute(&buffer);
        prop_assert!(relative_close(
            aggregate.running_sum.unwrap(),
            recomputed.running_sum.unwrap(),
            1e-4,
        ));
    }

    /// `idft(dft(x)) ≈ x` for any size.
    #[test]
    fn dft_idft_round_trips(
        n in 1usize..20,
        seed in 0u64..1000,
    ) {
        let input: Vec<f32> = (0..n).map(|i| ((i as u64 + seed) as f32 * 0.37).sin()).collect();
        let engine = FftEngine::new(n);
        let spectrum = ComplexSpectrum::from_real(&input);
        let freq = engine.dft(&spectrum).unwrap();
        let back = engine.idft(&freq).unwrap();
        for (a, b) in input.iter().zip(&back.real) {
            prop_assert!((a - b).abs() < 1e-3);
        }
    }

    /// `irfft(rfft(x)) ≈ x` for power-of-two sizes.
    #[test]
    fn rfft_irfft_round_trips(
        power in 1usize..8,
        seed in 0u64..1000,
    ) {
        let n = 1usize << power;
        let input: Vec<f32> = (0..n).map(|i| ((i as u64 + seed) as f32 * 0.21).cos()).collect();
        let engine = FftEngine::new(n);
        let half = engine.rfft(&input).unwrap();
        let back = engine.irfft(&half).unwrap();
        for (a, b) in input.iter().zip(&back) {
            prop_assert!((a - b).abs() < 1e-3);
        }
    }

    /// FIR SIMD dot product matches a plain scalar dot product.
    #[test]
    fn fir_dot_product_matches_scalar(
        a in prop::collection::vec(-1.0e6f32..1.0e6, 1..64),
        b in prop::collection::vec(-1.0e6f32..1.0e6, 1..64),
    ) {
        let n = a.len().min(b.len());
        let a = &a[..n];
        let b = &b[..n];
        let simd_result = simd::dot_product(a, b);
        let scalar: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
        prop_assert!(relative_close(scalar, simd_result, 1e-5));
    }

    /// Streaming a pipeline in two halves matches processing the whole
    /// buffer in one call.
    #[test]
    fn pipeline_streaming_consistency(
        values in prop::collection::vec(-10.0f32..10.0, 2..40),
        split in 1usize..39,
    ) {
        let split = split.min(values.len() - 1).max(1);

        let mut whole: Pipeline<f32> = Pipeline::new();
        whole.add_stage(StageSpec::MovingAverage { window_size: Some(4), window_duration_ms: None }).unwrap();
        let mut whole_buf = values.clone();
        whole.process(&mut whole_buf, None, ProcessOptions { channels: 1, sample_rate: Some(10.0) }).unwrap();

        let mut streamed: Pipeline<f32> = Pipeline::new();
        streamed.add_stage(StageSpec::MovingAverage { window_size: Some(4), window_duration_ms: None }).unwrap();
        let mut first = values[..split].to_vec();
        streamed.process(&mut first, None, ProcessOptions { channels: 1, sample_rate: Some(10.0) }).unwrap();
        let mut second = values[split..].to_vec();
        streamed.process(&mut second, None, ProcessOptions { channels: 1, sample_rate: Some(10.0) }).unwrap();

        let mut combined = first;
        combined.extend(second);
        for (x, y) in whole_buf.iter().zip(&combined) {
            prop_assert!((x - y).abs() < 1e-4);
        }
    }

    /// `processCopy` leaves the input unchanged and matches what `process`
    /// would have produced on an owned clone.
    #[test]
    fn process_copy_matches_process_and_does_not_mutate(
        values in prop::collection::vec(-10.0f32..10.0, 1..40),
    ) {
        let mut via_process: Pipeline<f32> = Pipeline::new();
        via_process.add_stage(StageSpec::Rms { window_size: Some(5), window_duration_ms: None }).unwrap();
        let mut expected = values.clone();
        via_process.process(&mut expected, None, ProcessOptions { channels: 1, sample_rate: Some(10.0) }).unwrap();

        let mut via_copy: Pipeline<f32> = Pipeline::new();
        via_copy.add_stage(StageSpec::Rms { window_size: Some(5), window_duration_ms: None }).unwrap();
        let original = values.clone();
        let result = via_copy
            .process_copy(&original, None, ProcessOptions { channels: 1, sample_rate: Some(10.0) })
            .unwrap();

        prop_assert_eq!(&original, &values);
        for (a, b) in expected.iter().zip(&result) {
            prop_assert!((a - b).abs() < 1e-4);
        }
    }

    /// A FIR kernel stamped on its own delay line and replayed from a
    /// restored delay line produces the same next-output.
    #[test]
    fn fir_restore_round_trip(
        taps in prop::collection::vec(-1.0f32..1.0, 1..16),
        values in prop::collection::vec(-5.0f32..5.0, 1..16),
    ) {
        let mut original = FirKernel::new(taps.clone()).unwrap();
        for &x in &values {
            original.process_sample(x);
        }
        let delay = original.delay_line();
        let pos = original.position();

        let mut restored = FirKernel::new(taps.clone()).unwrap();
        restored.restore(taps, delay, pos).unwrap();

        prop_assert_eq!(original.process_sample(1.0), restored.process_sample(1.0));
    }
}
