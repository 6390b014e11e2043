//! The Fourier transform engine: radix-2 Cooley-Tukey FFT/IFFT, the O(N²)
//! DFT/IDFT fallback, real-input half-spectrum variants, and spectral
//! utilities (`spec.md` §4.8, component C8).
//!
//! Complex values are a pair of parallel single-precision (or, generically,
//! `T`) arrays rather than a packed complex scalar type, per `spec.md` §3.
//! Twiddle factors are precomputed at construction using `num_complex`
//! (the teacher's own complex-number dependency) purely as internal
//! computation scaffolding; they never leak into the public surface.

use crate::error::{DspError, DspResult};
use crate::numeric::{Real, PI};
use num_complex::Complex64;

/// A spectrum represented as parallel real/imaginary arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexSpectrum<T> {
    pub real: Vec<T>,
    pub imag: Vec<T>,
}

impl<T: Real> ComplexSpectrum<T> {
    pub fn zeros(n: usize) -> Self {
        Self {
            real: vec![T::zero(); n],
            imag: vec![T::zero(); n],
        }
    }

    pub fn from_real(real: &[T]) -> Self {
        Self {
            real: real.to_vec(),
            imag: vec![T::zero(); real.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// `√(real² + imag²)` per bin.
    pub fn magnitude(&self) -> Vec<T> {
        self.real
            .iter()
            .zip(&self.imag)
            .map(|(&r, &i)| (r * r + i * i).sqrt())
            .collect()
    }

    /// `atan2(imag, real)` per bin.
    pub fn phase(&self) -> Vec<T> {
        self.real
            .iter()
            .zip(&self.imag)
            .map(|(&r, &i)| T::from_f64(i.to_f64().atan2(r.to_f64())))
            .collect()
    }

    /// `real² + imag²` per bin.
    pub fn power(&self) -> Vec<T> {
        self.real
            .iter()
            .zip(&self.imag)
            .map(|(&r, &i)| r * r + i * i)
            .collect()
    }
}

/// A Fourier transform engine constructed for a fixed size `N`.
pub struct FftEngine {
    n: usize,
    is_power_of_two: bool,
    /// `twiddles[k] = exp(-2*pi*i*k/n)` for `k` in `0..n/2`, present only
    /// when `n` is a power of two.
    twiddles: Vec<Complex64>,
}

impl FftEngine {
    pub fn new(n: usize) -> Self {
        let is_power_of_two = n > 0 && (n & (n - 1)) == 0;
        let twiddles = if is_power_of_two {
            (0..n / 2)
                .map(|k| Complex64::from_polar(1.0, -2.0 * PI * k as f64 / n as f64))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            n,
            is_power_of_two,
            twiddles,
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn is_power_of_two(&self) -> bool {
        self.is_power_of_two
    }

    fn check_size<T>(&self, spectrum: &ComplexSpectrum<T>, operation: &str) -> DspResult<()> {
        if spectrum.len() != self.n {
            return Err(DspError::SizeMismatch {
                operation: operation.into(),
                expected: self.n,
                found: spectrum.len(),
            });
        }
        Ok(())
    }

    fn require_power_of_two(&self, operation: &str) -> DspResult<()> {
        if !self.is_power_of_two {
            return Err(DspError::PowerOfTwoRequired {
                operation: operation.into(),
                size: self.n,
            });
        }
        Ok(())
    }

    /// In-place radix-2 decimation-in-time Cooley-Tukey FFT. `inverse`
    /// selects the conjugated-twiddle IFFT path; normalisation by `1/N` is
    /// applied by the caller (`ifft`), not here.
    fn radix2(&self, real: &mut [f64], imag: &mut [f64], inverse: bool) {
        let n = real.len();
        // Bit-reversal permutation.
        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j |= bit;
            if i < j {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let tw = self.twiddles[k * stride];
                    let tw = if inverse { tw.conj() } else { tw };
                    let idx_a = start + k;
                    let idx_b = start + k + half;
                    let br = real[idx_b] * tw.re - imag[idx_b] * tw.im;
                    let bi = real[idx_b] * tw.im + imag[idx_b] * tw.re;
                    real[idx_b] = real[idx_a] - br;
                    imag[idx_b] = imag[idx_a] - bi;
                    real[idx_a] += br;
                    imag[idx_a] += bi;
                }
            }
            len <<= 1;
        }
    }

    /// Complex-to-complex forward FFT. Requires `N` to be a power of two;
    /// use [`FftEngine::dft`] otherwise.
    pub fn fft<T: Real>(&self, input: &ComplexSpectrum<T>) -> DspResult<ComplexSpectrum<T>> {
        self.check_size(input, "fft")?;
        self.require_power_of_two("fft")?;
        let mut real: Vec<f64> = input.real.iter().map(|v| v.to_f64()).collect();
        let mut imag: Vec<f64> = input.imag.iter().map(|v| v.to_f64()).collect();
        self.radix2(&mut real, &mut imag, false);
        Ok(ComplexSpectrum {
            real: real.into_iter().map(T::from_f64).collect(),
            imag: imag.into_iter().map(T::from_f64).collect(),
        })
    }

    /// Complex-to-complex inverse FFT, including the `1/N` normalisation.
    pub fn ifft<T: Real>(&self, spectrum: &ComplexSpectrum<T>) -> DspResult<ComplexSpectrum<T>> {
        self.check_size(spectrum, "ifft")?;
        self.require_power_of_two("ifft")?;
        let mut real: Vec<f64> = spectrum.real.iter().map(|v| v.to_f64()).collect();
        let mut imag: Vec<f64> = spectrum.imag.iter().map(|v| v.to_f64()).collect();
        self.radix2(&mut real, &mut imag, true);
        let n = self.n as f64;
        Ok(ComplexSpectrum {
            real: real.into_iter().map(|v| T::from_f64(v / n)).collect(),
            imag: imag.into_iter().map(|v| T::from_f64(v / n)).collect(),
        })
    }

    /// O(N²) direct evaluation. Works for any `N >= 1`.
    pub fn dft<T: Real>(&self, input: &ComplexSpectrum<T>) -> DspResult<ComplexSpectrum<T>> {
        self.check_size(input, "dft")?;
        let n = self.n;
        let mut out = ComplexSpectrum::zeros(n);
        for k in 0..n {
            let mut sr = 0.0f64;
            let mut si = 0.0f64;
            for t in 0..n {
                let angle = -2.0 * PI * (k * t) as f64 / n as f64;
                let (s, c) = angle.sin_cos();
                let xr = input.real[t].to_f64();
                let xi = input.imag[t].to_f64();
                sr += xr * c - xi * s;
                si += xr * s + xi * c;
            }
            out.real[k] = T::from_f64(sr);
            out.imag[k] = T::from_f64(si);
        }
        Ok(out)
    }

    /// O(N²) direct inverse, including `1/N` normalisation.
    pub fn idft<T: Real>(&self, spectrum: &ComplexSpectrum<T>) -> DspResult<ComplexSpectrum<T>> {
        self.check_size(spectrum, "idft")?;
        let n = self.n;
        let mut out = ComplexSpectrum::zeros(n);
        for t in 0..n {
            let mut sr = 0.0f64;
            let mut si = 0.0f64;
            for k in 0..n {
                let angle = 2.0 * PI * (k * t) as f64 / n as f64;
                let (s, c) = angle.sin_cos();
                let xr = spectrum.real[k].to_f64();
                let xi = spectrum.imag[k].to_f64();
                sr += xr * c - xi * s;
                si += xr * s + xi * c;
            }
            out.real[t] = T::from_f64(sr / n as f64);
            out.imag[t] = T::from_f64(si / n as f64);
        }
        Ok(out)
    }

    /// Real-input FFT producing the half-spectrum `[0, N/2]` (DC through
    /// Nyquist inclusive). Requires `N` to be a power of two.
    pub fn rfft<T: Real>(&self, input: &[T]) -> DspResult<ComplexSpectrum<T>> {
        if input.len() != self.n {
            return Err(DspError::SizeMismatch {
                operation: "rfft".into(),
                expected: self.n,
                found: input.len(),
            });
        }
        self.require_power_of_two("rfft")?;
        let full = self.fft(&ComplexSpectrum::from_real(input))?;
        let half = self.n / 2;
        Ok(ComplexSpectrum {
            real: full.real[..=half].to_vec(),
            imag: full.imag[..=half].to_vec(),
        })
    }

    /// Reconstruct a real signal from its half-spectrum using Hermitian
    /// symmetry: for `k in [1, N/2-1]`, `X[N-k] = conj(X[k])`.
    pub fn irfft<T: Real>(&self, spectrum: &ComplexSpectrum<T>) -> DspResult<Vec<T>> {
        self.require_power_of_two("irfft")?;
        let half = self.n / 2;
        if spectrum.len() != half + 1 {
            return Err(DspError::SizeMismatch {
                operation: "irfft".into(),
                expected: half + 1,
                found: spectrum.len(),
            });
        }
        let mut full = ComplexSpectrum::zeros(self.n);
        full.real[..=half].copy_from_slice(&spectrum.real);
        full.imag[..=half].copy_from_slice(&spectrum.imag);
        for k in 1..half {
            full.real[self.n - k] = spectrum.real[k];
            full.imag[self.n - k] = -spectrum.imag[k];
        }
        let out = self.ifft(&full)?;
        Ok(out.real)
    }

    /// DFT equivalent of [`FftEngine::rfft`] for arbitrary `N`.
    pub fn rdft<T: Real>(&self, input: &[T]) -> DspResult<ComplexSpectrum<T>> {
        if input.len() != self.n {
            return Err(DspError::SizeMismatch {
                operation: "rdft".into(),
                expected: self.n,
                found: input.len(),
            });
        }
        let full = self.dft(&ComplexSpectrum::from_real(input))?;
        let half = self.n / 2;
        Ok(ComplexSpectrum {
            real: full.real[..=half].to_vec(),
            imag: full.imag[..=half].to_vec(),
        })
    }

    /// DFT equivalent of [`FftEngine::irfft`] for arbitrary `N`.
    pub fn irdft<T: Real>(&self, spectrum: &ComplexSpectrum<T>) -> DspResult<Vec<T>> {
        let half = self.n / 2;
        if spectrum.len() != half + 1 {
            return Err(DspError::SizeMismatch {
                operation: "irdft".into(),
                expected: half + 1,
                found: spectrum.len(),
            });
        }
        let mut full = ComplexSpectrum::zeros(self.n);
        full.real[..=half].copy_from_slice(&spectrum.real);
        full.imag[..=half].copy_from_slice(&spectrum.imag);
        for k in 1..(self.n - half) {
            full.real[self.n - k] = spectrum.real[k];
            full.imag[self.n - k] = -spectrum.imag[k];
        }
        let out = self.idft(&full)?;
        Ok(out.real)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_err(a: f32, b: f32) -> f32 {
        if b.abs() > 1e-9 {
            (a - b).abs() / b.abs()
        } else {
            (a - b).abs()
        }
    }

    #[test]
    fn power_of_two_fft_rejects_non_power_of_two_via_dft_path() {
        let engine = FftEngine::new(6);
        assert!(!engine.is_power_of_two());
        let spectrum = ComplexSpectrum::<f32>::from_real(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(engine.fft(&spectrum).is_err());
        assert!(engine.dft(&spectrum).is_ok());
    }

    #[test]
    fn idft_of_dft_round_trips() {
        let engine = FftEngine::new(5);
        let input = ComplexSpectrum::<f32> {
            real: vec![1.0, -2.0, 3.5, 0.25, -1.0],
            imag: vec![0.5, 0.0, -0.5, 1.0, 2.0],
        };
        let spectrum = engine.dft(&input).unwrap();
        let back = engine.idft(&spectrum).unwrap();
        for i in 0..5 {
            assert!(rel_err(back.real[i], input.real[i]) < 1e-4);
            assert!(rel_err(back.imag[i], input.imag[i]) < 1e-4);
        }
    }

    #[test]
    fn irfft_of_rfft_round_trips() {
        let engine = FftEngine::new(16);
        let input: Vec<f32> = (0..16)
            .map(|i| (i as f32 * 0.3).sin() + 0.5 * (i as f32 * 0.7).cos())
            .collect();
        let spectrum = engine.rfft(&input).unwrap();
        let back = engine.irfft(&spectrum).unwrap();
        for i in 0..16 {
            assert!(rel_err(back[i], input[i]) < 1e-4, "index {i}: {} vs {}", back[i], input[i]);
        }
    }

    #[test]
    fn parseval_identity_holds() {
        let engine = FftEngine::new(512);
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin()).collect();
        let spectrum = engine.rfft(&input).unwrap();
        let power = spectrum.power();
        let n = 512.0f32;
        let half = 256;
        let rhs = (power[0] + power[half] + 2.0 * power[1..half].iter().sum::<f32>()) / n;
        let lhs: f32 = input.iter().map(|x| x * x).sum();
        let rel = (lhs - rhs).abs() / lhs.abs().max(1.0);
        assert!(rel < 0.01, "parseval violated: lhs={lhs} rhs={rhs}");
    }

    #[test]
    fn sinusoid_peak_localizes_to_expected_bin() {
        let n = 512;
        let bin = 10;
        let engine = FftEngine::new(n);
        let input: Vec<f32> = (0..n)
            .map(|i| (crate::numeric::TAU * bin as f64 * i as f64 / n as f64).sin() as f32)
            .collect();
        let spectrum = engine.rfft(&input).unwrap();
        let mag = spectrum.magnitude();
        let peak = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak.0, bin);
        let peak_val = *peak.1;
        for (i, &m) in mag.iter().enumerate() {
            if i != bin {
                assert!(m < peak_val * 0.01, "bin {i} too large: {m} vs peak {peak_val}");
            }
        }
    }

    #[test]
    fn size_mismatch_is_reported() {
        let engine = FftEngine::new(8);
        let spectrum = ComplexSpectrum::<f32>::zeros(4);
        assert!(matches!(
            engine.fft(&spectrum),
            Err(DspError::SizeMismatch { .. })
        ));
    }
}
