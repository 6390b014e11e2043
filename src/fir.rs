//! FIR filter kernel: stateful/stateless convolution and windowed-sinc
//! design factories (`spec.md` §4.6, component C6).

use crate::error::{DspError, DspResult};
use crate::numeric::Float;

/// Window functions used both by the FIR design prototype and by
/// [`crate::streaming_fft`] (`spec.md` §4.6/§4.9).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WindowType {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
    Bartlett,
}

impl WindowType {
    /// Evaluate the window coefficient at index `n` of `len` (`spec.md`
    /// §4.9 gives the exact formulas; the FIR prototype uses the same
    /// family).
    pub fn coefficient(self, n: usize, len: usize) -> f64 {
        if len <= 1 {
            return 1.0;
        }
        let n = n as f64;
        let nm1 = (len - 1) as f64;
        match self {
            WindowType::Rectangular => 1.0,
            WindowType::Hann => 0.5 * (1.0 - (crate::numeric::TAU * n / nm1).cos()),
            WindowType::Hamming => 0.54 - 0.46 * (crate::numeric::TAU * n / nm1).cos(),
            WindowType::Blackman => {
                0.42 - 0.5 * (crate::numeric::TAU * n / nm1).cos()
                    + 0.08 * (2.0 * crate::numeric::TAU * n / nm1).cos()
            }
            WindowType::Bartlett => 1.0 - (2.0 * n / nm1 - 1.0).abs(),
        }
    }

    pub fn coefficients(self, len: usize) -> Vec<f64> {
        (0..len).map(|n| self.coefficient(n, len)).collect()
    }
}

/// The four band shapes the windowed-sinc factory can produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterBand {
    LowPass,
    HighPass,
    BandPass,
    BandStop,
}

/// A stateful (or stateless-capable) FIR kernel.
///
/// `taps[0..M-1]` are the coefficients; the delay line holds the last `M`
/// input samples in a ring. `process_sample` writes the newest sample at
/// the ring head and computes the dot product of `taps` against the ring
/// contents in newest-to-oldest order, using [`crate::numeric::Float::dot`]
/// (the SIMD primitive for the single-precision path).
#[derive(Clone)]
pub struct FirKernel<T: Float> {
    taps: Vec<T>,
    delay: Vec<T>,
    pos: usize,
    scratch: Vec<T>,
}

impl<T: Float> FirKernel<T> {
    /// Construct from a coefficient vector. Fails with `InvalidArgument` if
    /// empty (`spec.md` §4.6 failure modes).
    pub fn new(taps: Vec<T>) -> DspResult<Self> {
        if taps.is_empty() {
            return Err(DspError::InvalidArgument {
                stage: "fir".into(),
                parameter: "coefficients".into(),
                reason: "coefficient vector must not be empty".into(),
            });
        }
        let m = taps.len();
        Ok(Self {
            taps,
            delay: vec![T::zero(); m],
            pos: 0,
            scratch: vec![T::zero(); m],
        })
    }

    pub fn taps(&self) -> &[T] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn reset(&mut self) {
        self.delay.iter_mut().for_each(|v| *v = T::zero());
        self.pos = 0;
    }

    /// Process one sample against `self`'s persistent delay line.
    #[inline]
    pub fn process_sample(&mut self, x: T) -> T {
        self.delay[self.pos] = x;
        let m = self.taps.len();
        let out = Self::convolve_ring(&self.taps, &self.delay, self.pos, &mut self.scratch);
        self.pos = (self.pos + 1) % m;
        out
    }

    /// Process a block. When `stateless` is true, processing uses a private
    /// zero-initialized delay line and leaves `self`'s persistent state
    /// untouched (used for batch mode, `spec.md` §4.6).
    pub fn process(&mut self, input: &[T], output: &mut [T], stateless: bool) {
        if stateless {
            let m = self.taps.len();
            let mut delay = vec![T::zero(); m];
            let mut scratch = vec![T::zero(); m];
            let mut pos = 0usize;
            for (i, &x) in input.iter().enumerate() {
                delay[pos] = x;
                output[i] = Self::convolve_ring(&self.taps, &delay, pos, &mut scratch);
                pos = (pos + 1) % m;
            }
        } else {
            for (i, &x) in input.iter().enumerate() {
                output[i] = self.process_sample(x);
            }
        }
    }

    /// Dot product of `taps` against the ring `delay` read newest-to-oldest,
    /// with the most recently written slot at `pos`.
    #[inline]
    fn convolve_ring(taps: &[T], delay: &[T], pos: usize, scratch: &mut [T]) -> T {
        let m = taps.len();
        for k in 0..m {
            scratch[k] = delay[(pos + m - k) % m];
        }
        T::from_f64(T::dot(taps, scratch))
    }

    pub fn delay_line(&self) -> Vec<T> {
        self.delay.clone()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, taps: Vec<T>, delay: Vec<T>, pos: usize) -> DspResult<()> {
        if delay.len() != taps.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "fir.delayLine".into(),
                expected: taps.len().to_string(),
                found: delay.len().to_string(),
            });
        }
        self.scratch = vec![T::zero(); taps.len()];
        self.taps = taps;
        self.delay = delay;
        self.pos = pos % self.delay.len().max(1);
        Ok(())
    }
}

/// Windowed-sinc low-pass prototype: `2*fc*sinc(2*fc*(n - M/2))`, windowed
/// and DC-normalised to unity gain (`spec.md` §4.6).
fn sinc_lowpass(num_taps: usize, cutoff: f64, window: WindowType) -> Vec<f64> {
    let m = num_taps as f64 - 1.0;
    let win = window.coefficients(num_taps);
    let mut taps: Vec<f64> = (0..num_taps)
        .map(|n| {
            let k = n as f64 - m / 2.0;
            let h = if k.abs() < 1e-12 {
                2.0 * cutoff
            } else {
                (2.0 * crate::numeric::PI * cutoff * k).sin() / (crate::numeric::PI * k)
            };
            h * win[n]
        })
        .collect();
    let dc_gain: f64 = taps.iter().sum();
    if dc_gain.abs() > 1e-12 {
        for t in taps.iter_mut() {
            *t /= dc_gain;
        }
    }
    taps
}

fn validate_cutoff(stage: &str, param: &str, f: f64) -> DspResult<()> {
    if !(f > 0.0 && f < 0.5) {
        return Err(DspError::InvalidArgument {
            stage: stage.into(),
            parameter: param.into(),
            reason: format!("cutoff must lie in (0, 0.5), got {f}"),
        });
    }
    Ok(())
}

/// Design a windowed-sinc FIR of the given `band`/tap-count/cutoff(s).
///
/// High-pass is the spectral inversion of a low-pass (negate all taps, add
/// 1 to the centre tap) and requires an odd tap count. Band-pass is
/// `LP(f_high) - LP(f_low)`; band-stop is `LP(f_low) + HP(f_high)`. DC gain
/// is normalised to unity for the low-pass prototype only; derived bands
/// carry whatever gain the combination produces, per `spec.md` §4.6.
pub fn design_fir<T: Float>(
    band: FilterBand,
    num_taps: usize,
    cutoff_low: f64,
    cutoff_high: f64,
    window: WindowType,
) -> DspResult<Vec<T>> {
    if num_taps == 0 {
        return Err(DspError::InvalidArgument {
            stage: "fir".into(),
            parameter: "numTaps".into(),
            reason: "tap count must be nonzero".into(),
        });
    }
    let taps_f64: Vec<f64> = match band {
        FilterBand::LowPass => {
            validate_cutoff("fir", "cutoff", cutoff_low)?;
            sinc_lowpass(num_taps, cutoff_low, window)
        }
        FilterBand::HighPass => {
            validate_cutoff("fir", "cutoff", cutoff_low)?;
            if num_taps % 2 == 0 {
                return Err(DspError::InvalidArgument {
                    stage: "fir".into(),
                    parameter: "numTaps".into(),
                    reason: "spectral inversion for high-pass requires an odd tap count".into(),
                });
            }
            spectral_invert(sinc_lowpass(num_taps, cutoff_low, window))
        }
        FilterBand::BandPass => {
            validate_cutoff("fir", "cutoffLow", cutoff_low)?;
            validate_cutoff("fir", "cutoffHigh", cutoff_high)?;
            let lp_high = sinc_lowpass(num_taps, cutoff_high, window);
            let lp_low = sinc_lowpass(num_taps, cutoff_low, window);
            lp_high.iter().zip(&lp_low).map(|(&h, &l)| h - l).collect()
        }
        FilterBand::BandStop => {
            validate_cutoff("fir", "cutoffLow", cutoff_low)?;
            validate_cutoff("fir", "cutoffHigh", cutoff_high)?;
            if num_taps % 2 == 0 {
                return Err(DspError::InvalidArgument {
                    stage: "fir".into(),
                    parameter: "numTaps".into(),
                    reason: "band-stop high-pass component requires an odd tap count".into(),
                });
            }
            let lp_low = sinc_lowpass(num_taps, cutoff_low, window);
            let hp_high = spectral_invert(sinc_lowpass(num_taps, cutoff_high, window));
            lp_low.iter().zip(&hp_high).map(|(&l, &h)| l + h).collect()
        }
    };
    Ok(taps_f64.into_iter().map(T::from_f64).collect())
}

fn spectral_invert(mut taps: Vec<f64>) -> Vec<f64> {
    for t in taps.iter_mut() {
        *t = -*t;
    }
    let centre = taps.len() / 2;
    taps[centre] += 1.0;
    taps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_coefficients_rejected() {
        assert!(FirKernel::<f32>::new(vec![]).is_err());
    }

    #[test]
    fn stateless_process_does_not_touch_persistent_state() {
        let mut k = FirKernel::new(vec![1.0f32, 0.5, 0.25]).unwrap();
        k.process_sample(10.0);
        let state_before = k.delay_line();
        let input = [1.0f32, 2.0, 3.0];
        let mut out = [0.0f32; 3];
        k.process(&input, &mut out, true);
        assert_eq!(k.delay_line(), state_before);
    }

    #[test]
    fn lowpass_dc_gain_is_unity_and_symmetric() {
        let taps: Vec<f32> =
            design_fir(FilterBand::LowPass, 51, 0.25, 0.0, WindowType::Hamming).unwrap();
        let dc_gain: f32 = taps.iter().sum();
        assert!((dc_gain - 1.0).abs() < 1e-6, "dc_gain={dc_gain}");
        for i in 0..taps.len() / 2 {
            let diff = (taps[i] - taps[taps.len() - 1 - i]).abs();
            assert!(diff < 1e-6, "asymmetry at {i}: {diff}");
        }
    }

    #[test]
    fn highpass_requires_odd_tap_count() {
        assert!(
            design_fir::<f32>(FilterBand::HighPass, 50, 0.25, 0.0, WindowType::Hann).is_err()
        );
        assert!(design_fir::<f32>(FilterBand::HighPass, 51, 0.25, 0.0, WindowType::Hann).is_ok());
    }

    #[test]
    fn out_of_range_cutoff_rejected() {
        assert!(design_fir::<f32>(FilterBand::LowPass, 11, 0.0, 0.0, WindowType::Hann).is_err());
        assert!(design_fir::<f32>(FilterBand::LowPass, 11, 0.6, 0.0, WindowType::Hann).is_err());
    }
}
