//! Generic scalar trait shared by every core component.
//!
//! The engine is templated on the sample scalar type so that callers can
//! instantiate the whole stack at single or double precision. Rather than
//! pull in `num-traits` for this, we define the minimal surface the design
//! factories and kernels actually need, the same way the rest of this
//! ecosystem tends to hand-roll a small `Float`/`Real` trait instead of
//! depending on a generic-numerics crate.

/// Default pipeline scalar: single precision, per the engine's stated
/// default ("the default engine type is single precision").
pub type Sample = f32;

/// `f64` circular constants shared by the windowed-sinc and FFT twiddle
/// math, which both need double precision regardless of the pipeline's
/// scalar type.
pub const PI: f64 = std::f64::consts::PI;
pub const TAU: f64 = std::f64::consts::TAU;
pub const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Minimal floating-point surface required by buffers, reducers, and filter
/// kernels. Implemented for `f32` and `f64`; no other type may be used as a
/// pipeline scalar.
pub trait Float:
    Copy
    + Clone
    + Default
    + PartialOrd
    + std::fmt::Debug
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::iter::Sum
    + Send
    + Sync
    + 'static
{
    fn zero() -> Self;
    fn one() -> Self;
    fn from_f64(x: f64) -> Self;
    fn to_f64(self) -> f64;
    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn is_nan(self) -> bool;
    fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }

    /// `Σ aᵢ·bᵢ` accumulated in `f64`. The `f32` specialisation routes
    /// through [`crate::simd::dot_product`]; other precisions fall back to
    /// a plain scalar accumulation (`spec.md` §4.5/§4.6).
    fn dot(a: &[Self], b: &[Self]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(&x, &y)| x.to_f64() * y.to_f64())
            .sum()
    }

    /// Elementwise multiply `out[i] = a[i] * b[i]`. The `f32`
    /// specialisation routes through [`crate::simd::apply_window`].
    fn apply_window(a: &[Self], win: &[Self], out: &mut [Self]) {
        for i in 0..a.len() {
            out[i] = a[i] * win[i];
        }
    }
}

impl Float for f32 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(x: f64) -> Self {
        x as f32
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn abs(self) -> Self {
        f32::abs(self)
    }
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
    fn dot(a: &[Self], b: &[Self]) -> f64 {
        crate::simd::dot_product(a, b)
    }
    fn apply_window(a: &[Self], win: &[Self], out: &mut [Self]) {
        crate::simd::apply_window(a, win, out)
    }
}

impl Float for f64 {
    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_f64(x: f64) -> Self {
        x
    }
    fn to_f64(self) -> f64 {
        self
    }
    fn abs(self) -> Self {
        f64::abs(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

/// Real-valued transcendental functions needed by the IIR/FIR design
/// factories (bilinear transform, windowed-sinc prototype, Chebyshev pole
/// placement). Kept separate from [`Float`] because reducers and buffers
/// never need trigonometry.
pub trait Real: Float {
    fn tan(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn asinh(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn pi() -> Self;
}

impl Real for f32 {
    fn tan(self) -> Self {
        f32::tan(self)
    }
    fn sin(self) -> Self {
        f32::sin(self)
    }
    fn cos(self) -> Self {
        f32::cos(self)
    }
    fn sinh(self) -> Self {
        f32::sinh(self)
    }
    fn cosh(self) -> Self {
        f32::cosh(self)
    }
    fn asinh(self) -> Self {
        f32::asinh(self)
    }
    fn exp(self) -> Self {
        f32::exp(self)
    }
    fn ln(self) -> Self {
        f32::ln(self)
    }
    fn powi(self, n: i32) -> Self {
        f32::powi(self, n)
    }
    fn pi() -> Self {
        std::f32::consts::PI
    }
}

impl Real for f64 {
    fn tan(self) -> Self {
        f64::tan(self)
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn sinh(self) -> Self {
        f64::sinh(self)
    }
    fn cosh(self) -> Self {
        f64::cosh(self)
    }
    fn asinh(self) -> Self {
        f64::asinh(self)
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn ln(self) -> Self {
        f64::ln(self)
    }
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
    fn pi() -> Self {
        std::f64::consts::PI
    }
}
