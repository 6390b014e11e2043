//! Streaming digital-signal-processing engine for biosignals, audio, and
//! sensor telemetry.
//!
//! The core is a composable pipeline of per-sample stages — sliding-window
//! statistical filters, FIR/IIR kernels, and a windowed streaming FFT — that
//! can be driven either as a one-shot batch over a buffer or fed
//! sample-by-sample with explicit per-sample timestamps. Pipeline state is
//! persistable so processing can be paused, migrated, and resumed without
//! discontinuity.
//!
//! See [`prelude`] for the common entry points, or reach for the individual
//! modules directly: [`ring`]/[`timeseries`] (buffers), [`reducer`]/[`window`]
//! (sliding-window statistics), [`simd`] (vectorised primitives),
//! [`fir`]/[`iir`] (filter kernels), [`fft`]/[`streaming_fft`] (Fourier
//! transforms), [`stage`]/[`pipeline`] (the runtime), and [`snapshot`]
//! (the persisted state document).

pub mod callbacks;
pub mod error;
pub mod fft;
pub mod fir;
pub mod iir;
pub mod numeric;
pub mod pipeline;
pub mod prelude;
pub mod reducer;
pub mod ring;
pub mod simd;
pub mod snapshot;
pub mod stage;
pub mod streaming_fft;
pub mod timeseries;
pub mod window;
