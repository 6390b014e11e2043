use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dspflow::fft::{ComplexSpectrum, FftEngine};
use dspflow::fir::WindowType;
use dspflow::iir::{BiquadCoefs, IirKernel};
use dspflow::pipeline::{Pipeline, ProcessOptions, StageSpec};
use dspflow::simd;
use dspflow::streaming_fft::FftMode;

fn simd_dot_bench(data: &[f32], coeffs: &[f32]) -> f32 {
    simd::dot_product(data, coeffs)
}

fn biquad_bench(kernel: &mut IirKernel<f32>, samples: &[f32]) -> f32 {
    let mut acc = 0.0;
    for &x in samples {
        acc += kernel.process_sample(x);
    }
    acc
}

fn fft_bench(engine: &FftEngine, input: &ComplexSpectrum<f32>) -> usize {
    engine.fft(input).unwrap().len()
}

fn pipeline_bench(pipeline: &mut Pipeline<f32>, samples: &[f32]) {
    let mut buf = samples.to_vec();
    pipeline
        .process(
            &mut buf,
            None,
            ProcessOptions {
                channels: 1,
                sample_rate: Some(1000.0),
            },
        )
        .unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let data: Vec<f32> = (0..256).map(|i| (i as f32 * 0.01).sin()).collect();
    let coeffs: Vec<f32> = (0..256).map(|i| 1.0 / (i as f32 + 1.0)).collect();
    c.bench_function("simd_dot_product_256", |b| {
        b.iter(|| simd_dot_bench(black_box(&data), black_box(&coeffs)))
    });

    let biquad = BiquadCoefs {
        b0: 0.2_f32,
        b1: 0.1,
        b2: 0.0,
        a1: -0.3,
        a2: 0.05,
    };
    let samples: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.02).sin()).collect();
    c.bench_function("biquad_process_1024_samples", |b| {
        b.iter(|| {
            let mut kernel = IirKernel::from_biquad(biquad);
            biquad_bench(black_box(&mut kernel), black_box(&samples))
        })
    });

    let fft_input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin()).collect();
    let spectrum = ComplexSpectrum::from_real(&fft_input);
    let engine = FftEngine::new(1024);
    c.bench_function("fft_1024", |b| {
        b.iter(|| fft_bench(black_box(&engine), black_box(&spectrum)))
    });

    let pipeline_input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.03).cos()).collect();
    c.bench_function("pipeline_process_1024_samples", |b| {
        b.iter(|| {
            let mut pipeline = Pipeline::<f32>::new();
            pipeline
                .add_stage(StageSpec::MovingAverage {
                    window_size: Some(16),
                    window_duration_ms: None,
                })
                .unwrap();
            pipeline
                .add_stage(StageSpec::Fft {
                    fft_size: 256,
                    mode: FftMode::Moving,
                    real_input: true,
                    window: WindowType::Hann,
                })
                .unwrap();
            pipeline_bench(black_box(&mut pipeline), black_box(&pipeline_input))
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
