//! Vectorised array primitives (`spec.md` §4.5, component C5).
//!
//! The spec asks for routines that "process single-precision arrays in wide
//! lanes where available and fall back to a scalar loop otherwise". This
//! crate has no `unsafe` SIMD intrinsics dependency in the teacher's stack,
//! so lane-width parallelism is expressed portably: each routine is written
//! as a chunked reduction (`chunks_exact`) over a small fixed lane width,
//! which LLVM auto-vectorizes on platforms that have the relevant
//! instruction set, with a scalar remainder loop for the unaligned tail —
//! exactly the "non-SIMD-aligned tails fall back to the scalar loop"
//! contract in `spec.md` §4.5. No routine here allocates.

const LANES: usize = 8;

/// `Σ aᵢ·bᵢ`, accumulated in `f64` regardless of the input precision (the
/// accuracy rule `spec.md` §4.5 states and `spec.md` §9 generalizes to all
/// reducers).
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len().min(b.len());
    let mut lanes = [0f64; LANES];
    let mut chunks_a = a[..n].chunks_exact(LANES);
    let mut chunks_b = b[..n].chunks_exact(LANES);
    for (ca, cb) in (&mut chunks_a).zip(&mut chunks_b) {
        for lane in 0..LANES {
            lanes[lane] += ca[lane] as f64 * cb[lane] as f64;
        }
    }
    let mut acc: f64 = lanes.iter().sum();
    for (&x, &y) in chunks_a.remainder().iter().zip(chunks_b.remainder()) {
        acc += x as f64 * y as f64;
    }
    acc
}

/// `Σ aᵢ`, accumulated in `f64`.
#[inline]
pub fn sum(a: &[f32]) -> f64 {
    let mut lanes = [0f64; LANES];
    let mut chunks = a.chunks_exact(LANES);
    for c in &mut chunks {
        for lane in 0..LANES {
            lanes[lane] += c[lane] as f64;
        }
    }
    let mut acc: f64 = lanes.iter().sum();
    for &x in chunks.remainder() {
        acc += x as f64;
    }
    acc
}

/// `Σ aᵢ²`, accumulated in `f64`.
#[inline]
pub fn sum_of_squares(a: &[f32]) -> f64 {
    let mut lanes = [0f64; LANES];
    let mut chunks = a.chunks_exact(LANES);
    for c in &mut chunks {
        for lane in 0..LANES {
            let v = c[lane] as f64;
            lanes[lane] += v * v;
        }
    }
    let mut acc: f64 = lanes.iter().sum();
    for &x in chunks.remainder() {
        acc += (x as f64) * (x as f64);
    }
    acc
}

/// Sign-stripping rectification, in place: `a[i] = |a[i]|`.
#[inline]
pub fn abs_inplace(a: &mut [f32]) {
    for x in a.iter_mut() {
        *x = x.abs();
    }
}

/// Half-wave rectification, in place: `a[i] = max(a[i], 0)`.
#[inline]
pub fn max_zero_inplace(a: &mut [f32]) {
    for x in a.iter_mut() {
        *x = x.max(0.0);
    }
}

/// Elementwise multiply `out[i] = in[i] * win[i]`.
#[inline]
pub fn apply_window(input: &[f32], win: &[f32], out: &mut [f32]) {
    debug_assert_eq!(input.len(), win.len());
    debug_assert_eq!(input.len(), out.len());
    for i in 0..input.len() {
        out[i] = input[i] * win[i];
    }
}
