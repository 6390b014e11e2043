//! The error taxonomy for the pipeline and its kernels (`spec.md` §7).
//!
//! Every fallible public entry point returns `Result<T, DspError>`. Errors
//! are actionable: they name the offending stage, the offending parameter,
//! and, for the two state-mismatch variants, the expected vs. found values.
//! Nothing in the public surface panics on caller-supplied data — the
//! teacher's `fft.rs` has a bare `panic!("Unsupported FFT length.")` for a
//! similar condition, but `spec.md` §7 requires synchronous, named,
//! recoverable errors instead.

use thiserror::Error;

/// The complete error taxonomy for the engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DspError {
    /// A construction-time parameter was out of its valid range.
    #[error("invalid argument for `{parameter}` on {stage}: {reason}")]
    InvalidArgument {
        stage: String,
        parameter: String,
        reason: String,
    },

    /// `samples.len() % channels != 0`, or `timestamps.len() != frames`.
    #[error("shape mismatch in {stage}: {reason}")]
    ShapeMismatch { stage: String, reason: String },

    /// Caller supplied both an explicit timestamp vector and a sample rate.
    #[error(
        "argument conflict in {stage}: an explicit timestamp vector and a sample rate were both supplied"
    )]
    ArgumentConflict { stage: String },

    /// `fft`/`ifft`/`rfft`/`irfft` called with a non-power-of-two size.
    #[error("{operation} requires a power-of-two size, got {size}")]
    PowerOfTwoRequired { operation: String, size: usize },

    /// Transform input length did not match the engine's configured size.
    #[error("size mismatch in {operation}: expected {expected}, got {found}")]
    SizeMismatch {
        operation: String,
        expected: usize,
        found: usize,
    },

    /// A stateful call was made on a stateless-constructed kernel, or vice versa.
    #[error("invalid operation on {stage}: {reason}")]
    InvalidOperation { stage: String, reason: String },

    /// A snapshot's stage list does not structurally match the live pipeline.
    #[error("state incompatible at stage {index} ({field}): expected {expected}, found {found}")]
    StateIncompatible {
        index: usize,
        field: String,
        expected: String,
        found: String,
    },

    /// A snapshot's recomputed aggregate disagrees with the stored aggregate
    /// beyond tolerance, or the schema version does not match.
    #[error("state corrupted at stage {index}, channel {channel}, field {field}: {reason}")]
    StateCorrupted {
        index: usize,
        channel: usize,
        field: String,
        reason: String,
    },

    /// Internal-only: reading an empty buffer. Surfacing this to a caller is
    /// a bug, not an expected condition.
    #[error("internal error: empty buffer read in {context}")]
    Empty { context: String },
}

pub type DspResult<T> = Result<T, DspError>;
