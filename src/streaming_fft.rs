//! Windowed streaming FFT over a circular buffer (`spec.md` §4.9, component
//! C9).
//!
//! `MovingFftFilter` accumulates samples until it has `fftSize` of them,
//! then transitions (once, never back) into either moving mode — a fresh
//! spectrum on every subsequent sample — or batched mode, where a spectrum
//! is emitted only every `hopSize` samples. Window coefficients are shared
//! with the FIR design prototype's window family (`crate::fir::WindowType`)
//! so the five functions in `spec.md` §4.9 have exactly one implementation.

use crate::fft::{ComplexSpectrum, FftEngine};
use crate::fir::WindowType;
use crate::numeric::Real;
use crate::ring::CircularBuffer;

/// Moving mode emits on every sample once the buffer is full; batched mode
/// emits every `hop_size` samples (`hop_size == 0` means `hop_size ==
/// fft_size`, i.e. no overlap).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FftMode {
    Moving,
    Batched { hop_size: usize },
}

/// The three states `spec.md` §4.9 enumerates. Exposed so callers (and the
/// pipeline's `listState`) can report where a stage currently sits without
/// re-deriving it from private fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FftStreamState {
    Accumulating,
    ReadyMoving,
    ReadyBatched,
}

pub struct MovingFftFilter<T: Real> {
    engine: FftEngine,
    buffer: CircularBuffer<T>,
    window_type: WindowType,
    window: Vec<T>,
    fft_size: usize,
    mode: FftMode,
    real_input: bool,
    ready_pushes: u64,
    scratch: Vec<T>,
}

impl<T: Real + Default> MovingFftFilter<T> {
    pub fn new(fft_size: usize, mode: FftMode, real_input: bool, window_type: WindowType) -> Self {
        let coeffs: Vec<T> = window_type
            .coefficients(fft_size)
            .into_iter()
            .map(T::from_f64)
            .collect();
        Self {
            engine: FftEngine::new(fft_size),
            buffer: CircularBuffer::new(fft_size),
            window_type,
            window: coeffs,
            fft_size,
            mode,
            real_input,
            ready_pushes: 0,
            scratch: vec![T::zero(); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Changing the window recomputes the coefficient vector immediately
    /// (`spec.md` §4.9).
    pub fn set_window_type(&mut self, window_type: WindowType) {
        self.window_type = window_type;
        self.window = window_type
            .coefficients(self.fft_size)
            .into_iter()
            .map(T::from_f64)
            .collect();
    }

    pub fn state(&self) -> FftStreamState {
        if self.buffer.count() < self.fft_size {
            FftStreamState::Accumulating
        } else {
            match self.mode {
                FftMode::Moving => FftStreamState::ReadyMoving,
                FftMode::Batched { .. } => FftStreamState::ReadyBatched,
            }
        }
    }

    /// `reset()` returns to Accumulating and zeroes the sample counter.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready_pushes = 0;
    }

    fn effective_hop(&self) -> usize {
        match self.mode {
            FftMode::Moving => 1,
            FftMode::Batched { hop_size } => {
                if hop_size == 0 {
                    self.fft_size
                } else {
                    hop_size
                }
            }
        }
    }

    /// Push one sample. Returns `Some(spectrum)` on an emission frame,
    /// `None` while accumulating or between hops in batched mode.
    pub fn push(&mut self, x: T) -> Option<ComplexSpectrum<T>> {
        self.buffer.push(x);
        if self.buffer.count() < self.fft_size {
            return None;
        }
        self.ready_pushes += 1;
        let hop = self.effective_hop() as u64;
        if (self.ready_pushes - 1) % hop != 0 {
            return None;
        }
        Some(self.emit())
    }

    fn emit(&mut self) -> ComplexSpectrum<T> {
        let frame = self.buffer.to_vec();
        T::apply_window(&frame, &self.window, &mut self.scratch);
        if self.real_input {
            if self.engine.is_power_of_two() {
                self.engine.rfft(&self.scratch).expect("size validated at construction")
            } else {
                self.engine.rdft(&self.scratch).expect("size validated at construction")
            }
        } else {
            let spectrum = ComplexSpectrum::from_real(&self.scratch);
            if self.engine.is_power_of_two() {
                self.engine.fft(&spectrum).expect("size validated at construction")
            } else {
                self.engine.dft(&spectrum).expect("size validated at construction")
            }
        }
    }

    pub fn buffer_snapshot(&self) -> Vec<T> {
        self.buffer.to_vec()
    }

    /// The hop-phase counter (`spec.md` §4.9): number of samples pushed
    /// since the buffer first became full. Must be persisted verbatim in
    /// batched mode, since the hop phase `(ready_pushes-1) % hop` determines
    /// which future sample triggers the next emission.
    pub fn ready_pushes(&self) -> u64 {
        self.ready_pushes
    }

    pub fn restore(&mut self, buffer: &[T], ready_pushes: u64) -> crate::error::DspResult<()> {
        self.buffer.from_vec(buffer)?;
        self.ready_pushes = ready_pushes;
        Ok(())
    }
}

/// Frequency in Hz of bin `k` for an engine of size `fft_size` sampled at
/// `sample_rate` Hz: `bin_k <-> k * sample_rate / fft_size` (`spec.md`
/// §4.9).
pub fn bin_frequency(k: usize, fft_size: usize, sample_rate: f64) -> f64 {
    k as f64 * sample_rate / fft_size as f64
}
