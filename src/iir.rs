//! IIR filter kernel: Direct-Form recursion, bilinear-transform-based
//! design factories, and the advisory stability predicate (`spec.md` §4.7,
//! component C7).
//!
//! Coefficients are `b[0..M]` (feedforward) and `a[1..N]` (feedback), with
//! `a[0] = 1` enforced by pre-division at design time. The delay lines are
//! the previous `M` inputs and previous `N` outputs, kept in separate
//! rings — the shape `spec.md` §3/§4.7 spells out for its "Direct-Form-II"
//! recursion (a canonical Direct Form II would share a single history
//! buffer between the feedforward and feedback sides, but this crate
//! follows the two-ring shape the spec's own `processSample` formula
//! describes, terminology kept as the spec names it).

use crate::error::{DspError, DspResult};
use crate::numeric::{Real, PI, SQRT_2};

/// Coefficients of a single second-order (biquad) section.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BiquadCoefs<F> {
    pub b0: F,
    pub b1: F,
    pub b2: F,
    pub a1: F,
    pub a2: F,
}

/// A generic, possibly higher-order, stateful IIR kernel in the delay-line
/// shape `spec.md` §4.7 specifies.
#[derive(Clone)]
pub struct IirKernel<T: Real> {
    b: Vec<T>,
    a: Vec<T>, // a[k] here is the spec's a[k+1]; a[0] (spec's implicit 1) is not stored.
    x_hist: Vec<T>, // x_hist[0] = x[n-1], x_hist[1] = x[n-2], ...
    y_hist: Vec<T>, // y_hist[0] = y[n-1], y_hist[1] = y[n-2], ...
}

impl<T: Real> IirKernel<T> {
    /// `b` must be nonempty (`b[0]` is required); `a` holds `a[1..N]` and
    /// may be empty (a pure FIR expressed through the IIR kernel shape).
    pub fn new(b: Vec<T>, a: Vec<T>) -> DspResult<Self> {
        if b.is_empty() {
            return Err(DspError::InvalidArgument {
                stage: "iir".into(),
                parameter: "b".into(),
                reason: "feedforward coefficient vector must not be empty".into(),
            });
        }
        let m = b.len() - 1;
        let n = a.len();
        Ok(Self {
            b,
            a,
            x_hist: vec![T::zero(); m],
            y_hist: vec![T::zero(); n],
        })
    }

    pub fn from_biquad(c: BiquadCoefs<T>) -> Self {
        Self {
            b: vec![c.b0, c.b1, c.b2],
            a: vec![c.a1, c.a2],
            x_hist: vec![T::zero(); 2],
            y_hist: vec![T::zero(); 2],
        }
    }

    pub fn b(&self) -> &[T] {
        &self.b
    }

    pub fn a(&self) -> &[T] {
        &self.a
    }

    pub fn reset(&mut self) {
        self.x_hist.iter_mut().for_each(|v| *v = T::zero());
        self.y_hist.iter_mut().for_each(|v| *v = T::zero());
    }

    /// `y[n] = b0*x[n] + Σ_{k>=1} b[k]*x[n-k] - Σ_{k>=1} a[k]*y[n-k]`, then
    /// shift `x` into the input history and `y` into the output history.
    #[inline]
    pub fn process_sample(&mut self, x: T) -> T {
        let mut y = self.b[0] * x;
        for k in 1..self.b.len() {
            y += self.b[k] * self.x_hist[k - 1];
        }
        for k in 0..self.a.len() {
            y -= self.a[k] * self.y_hist[k];
        }
        for i in (1..self.x_hist.len()).rev() {
            self.x_hist[i] = self.x_hist[i - 1];
        }
        if !self.x_hist.is_empty() {
            self.x_hist[0] = x;
        }
        for i in (1..self.y_hist.len()).rev() {
            self.y_hist[i] = self.y_hist[i - 1];
        }
        if !self.y_hist.is_empty() {
            self.y_hist[0] = y;
        }
        y
    }

    pub fn process(&mut self, input: &[T], output: &mut [T]) {
        for (i, &x) in input.iter().enumerate() {
            output[i] = self.process_sample(x);
        }
    }

    /// `Σ|a[k]| < 1` — necessary-but-not-sufficient, advisory only
    /// (`spec.md` §4.7/§9: a rigorous pole-factoring check is out of scope).
    pub fn is_stable(&self) -> bool {
        self.a.iter().map(|v| v.abs().to_f64()).sum::<f64>() < 1.0
    }

    pub fn input_history(&self) -> Vec<T> {
        self.x_hist.clone()
    }

    pub fn output_history(&self) -> Vec<T> {
        self.y_hist.clone()
    }

    pub fn restore(
        &mut self,
        b: Vec<T>,
        a: Vec<T>,
        x_hist: Vec<T>,
        y_hist: Vec<T>,
    ) -> DspResult<()> {
        if x_hist.len() != b.len().saturating_sub(1) || y_hist.len() != a.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "iir.history".into(),
                expected: format!("{}/{}", b.len().saturating_sub(1), a.len()),
                found: format!("{}/{}", x_hist.len(), y_hist.len()),
            });
        }
        self.b = b;
        self.a = a;
        self.x_hist = x_hist;
        self.y_hist = y_hist;
        Ok(())
    }
}

/// Bilinear-transform a 2nd-order analog prototype `N(s)/D(s)` with
/// `D(s) = s^2 + d1*s + d0` (monic) and `N(s) = n2*s^2 + n1*s + n0` into a
/// digital biquad via `s = (z-1)/(z+1)`.
fn bilinear_biquad(n2: f64, n1: f64, n0: f64, d1: f64, d0: f64) -> (f64, f64, f64, f64, f64) {
    let a2 = n2 + n1 + n0;
    let a1 = 2.0 * (n0 - n2);
    let a0 = n2 - n1 + n0;
    let b2 = 1.0 + d1 + d0;
    let b1 = 2.0 * (d0 - 1.0);
    let b0 = 1.0 - d1 + d0;
    (a2 / b2, a1 / b2, a0 / b2, b1 / b2, b0 / b2)
}

/// LP or HP band selector shared by the biquad design factories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LowHigh {
    Low,
    High,
}

fn validate_cutoff(stage: &str, f: f64) -> DspResult<()> {
    if !(f > 0.0 && f < 0.5) {
        return Err(DspError::InvalidArgument {
            stage: stage.into(),
            parameter: "cutoff".into(),
            reason: format!("cutoff must lie in (0, 0.5), got {f}"),
        });
    }
    Ok(())
}

/// First-order LP/HP: bilinear-transformed analog RC prototype,
/// `K = tan(π·f_c)` (`spec.md` §4.7).
pub fn design_first_order<T: Real>(band: LowHigh, cutoff: f64) -> DspResult<BiquadCoefs<T>> {
    validate_cutoff("iir.firstOrder", cutoff)?;
    let k = (PI * cutoff).tan();
    let a1 = (k - 1.0) / (k + 1.0);
    let (b0, b1) = match band {
        LowHigh::Low => (k / (k + 1.0), k / (k + 1.0)),
        LowHigh::High => (1.0 / (k + 1.0), -1.0 / (k + 1.0)),
    };
    Ok(BiquadCoefs {
        b0: T::from_f64(b0),
        b1: T::from_f64(b1),
        b2: T::zero(),
        a1: T::from_f64(a1),
        a2: T::zero(),
    })
}

/// Butterworth LP/HP biquad, order 2 (`spec.md` §4.7: orders above 2 are
/// accepted-but-collapse-to-a-biquad in the source this repository is
/// grounded on; this repository instead rejects `order != 2` explicitly —
/// see `DESIGN.md`).
pub fn design_butterworth_biquad<T: Real>(
    band: LowHigh,
    cutoff: f64,
    order: u32,
) -> DspResult<BiquadCoefs<T>> {
    if order != 2 {
        return Err(DspError::InvalidArgument {
            stage: "iir.butterworth".into(),
            parameter: "order".into(),
            reason: format!(
                "only order 2 is implemented as a true biquad; got order {order}"
            ),
        });
    }
    validate_cutoff("iir.butterworth", cutoff)?;
    let k = (PI * cutoff).tan();
    let d1 = SQRT_2 * k;
    let d0 = k * k;
    let (n2, n1, n0) = match band {
        LowHigh::Low => (0.0, 0.0, k * k),
        LowHigh::High => (1.0, 0.0, 0.0),
    };
    let (b0, b1, b2, a1, a2) = bilinear_biquad(n2, n1, n0, d1, d0);
    Ok(BiquadCoefs {
        b0: T::from_f64(b0),
        b1: T::from_f64(b1),
        b2: T::from_f64(b2),
        a1: T::from_f64(a1),
        a2: T::from_f64(a2),
    })
}

/// Chebyshev type I LP/HP biquad, order 2, passband ripple `r` dB, `r ∈
/// (0, 3]` (`spec.md` §4.7). `ε = sqrt(10^(r/10) - 1)`; poles lie on an
/// ellipse with semi-axes `sinh(asinh(1/ε)/order)` and
/// `cosh(asinh(1/ε)/order)`.
///
/// The high-pass variant reuses the low-pass pole placement with a pure
/// `s^2` numerator (the same pole-sharing shortcut `design_butterworth_biquad`
/// uses for its HP variant) rather than the exact `s -> 1/s` frequency
/// transform a from-scratch Chebyshev HP design would apply; see
/// `DESIGN.md`.
pub fn design_chebyshev1_biquad<T: Real>(
    band: LowHigh,
    cutoff: f64,
    ripple_db: f64,
    order: u32,
) -> DspResult<BiquadCoefs<T>> {
    if order != 2 {
        return Err(DspError::InvalidArgument {
            stage: "iir.chebyshev1".into(),
            parameter: "order".into(),
            reason: format!(
                "only order 2 is implemented as a true biquad; got order {order}"
            ),
        });
    }
    if !(ripple_db > 0.0 && ripple_db <= 3.0) {
        return Err(DspError::InvalidArgument {
            stage: "iir.chebyshev1".into(),
            parameter: "rippleDb".into(),
            reason: format!("ripple must lie in (0, 3] dB, got {ripple_db}"),
        });
    }
    validate_cutoff("iir.chebyshev1", cutoff)?;

    let epsilon = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
    let v = (1.0 / epsilon).asinh() / 2.0;
    let sinh_v = v.sinh();
    let cosh_v = v.cosh();
    let quarter_pi = PI / 4.0;
    // Denominator of the wc=1 analog prototype: s^2 + d1*s + d0.
    let d1_proto = 2.0 * sinh_v * quarter_pi.sin();
    let d0_proto =
        sinh_v * sinh_v * quarter_pi.sin().powi(2) + cosh_v * cosh_v * quarter_pi.cos().powi(2);

    let k = (PI * cutoff).tan();
    let d1 = d1_proto * k;
    let d0 = d0_proto * k * k;

    let (n2, n1, n0) = match band {
        LowHigh::Low => {
            // Even-order Chebyshev I has DC gain 1/sqrt(1+eps^2), not unity.
            let dc_gain = 1.0 / (1.0 + epsilon * epsilon).sqrt();
            (0.0, 0.0, d0 * dc_gain)
        }
        LowHigh::High => (1.0, 0.0, 0.0),
    };
    let (b0, b1, b2, a1, a2) = bilinear_biquad(n2, n1, n0, d1, d0);
    Ok(BiquadCoefs {
        b0: T::from_f64(b0),
        b1: T::from_f64(b1),
        b2: T::from_f64(b2),
        a1: T::from_f64(a1),
        a2: T::from_f64(a2),
    })
}

/// Band-pass as a cascade of `HP(f_low)` then `LP(f_high)` (`spec.md` §4.7 /
/// §9: the source this repository is grounded on ships only the HP stage as
/// a placeholder; this repository implements the full cascade).
pub fn design_bandpass_cascade<T: Real>(
    cutoff_low: f64,
    cutoff_high: f64,
    chebyshev_ripple_db: Option<f64>,
) -> DspResult<[BiquadCoefs<T>; 2]> {
    let hp = match chebyshev_ripple_db {
        Some(r) => design_chebyshev1_biquad(LowHigh::High, cutoff_low, r, 2)?,
        None => design_butterworth_biquad(LowHigh::High, cutoff_low, 2)?,
    };
    let lp = match chebyshev_ripple_db {
        Some(r) => design_chebyshev1_biquad(LowHigh::Low, cutoff_high, r, 2)?,
        None => design_butterworth_biquad(LowHigh::Low, cutoff_high, 2)?,
    };
    Ok([hp, lp])
}

/// Audio-EQ-Cookbook peaking EQ biquad. `gain_db` is the peak gain, `q` the
/// resonance (must be positive). Normalised by dividing through by `a0`
/// (`spec.md` §4.7).
pub fn design_peaking_eq<T: Real>(cutoff: f64, q: f64, gain_db: f64) -> DspResult<BiquadCoefs<T>> {
    validate_cutoff("iir.peakingEq", cutoff)?;
    if !(q > 0.0) {
        return Err(DspError::InvalidArgument {
            stage: "iir.peakingEq".into(),
            parameter: "q".into(),
            reason: format!("Q must be positive, got {q}"),
        });
    }
    let w0 = crate::numeric::TAU * cutoff;
    let alpha = w0.sin() / (2.0 * q);
    let a = 10f64.powf(gain_db / 40.0);

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * w0.cos();
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * w0.cos();
    let a2 = 1.0 - alpha / a;
    Ok(BiquadCoefs {
        b0: T::from_f64(b0 / a0),
        b1: T::from_f64(b1 / a0),
        b2: T::from_f64(b2 / a0),
        a1: T::from_f64(a1 / a0),
        a2: T::from_f64(a2 / a0),
    })
}

/// Audio-EQ-Cookbook low-shelf / high-shelf biquad. `shelf_slope` is the
/// cookbook's `S` parameter (1.0 gives the steepest shelf without overshoot).
pub fn design_shelf<T: Real>(
    band: LowHigh,
    cutoff: f64,
    gain_db: f64,
    shelf_slope: f64,
) -> DspResult<BiquadCoefs<T>> {
    validate_cutoff("iir.shelf", cutoff)?;
    if !(shelf_slope > 0.0) {
        return Err(DspError::InvalidArgument {
            stage: "iir.shelf".into(),
            parameter: "shelfSlope".into(),
            reason: format!("shelf slope must be positive, got {shelf_slope}"),
        });
    }
    let w0 = crate::numeric::TAU * cutoff;
    let a = 10f64.powf(gain_db / 40.0);
    let alpha =
        w0.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / shelf_slope - 1.0) + 2.0).sqrt();
    let cos_w0 = w0.cos();
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    let (b0, b1, b2, a0, a1, a2) = match band {
        LowHigh::Low => (
            a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
            a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
            (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        ),
        LowHigh::High => (
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        ),
    };
    Ok(BiquadCoefs {
        b0: T::from_f64(b0 / a0),
        b1: T::from_f64(b1 / a0),
        b2: T::from_f64(b2 / a0),
        a1: T::from_f64(a1 / a0),
        a2: T::from_f64(a2 / a0),
    })
}
