//! Convenience re-export of the types most callers need, the same shape as
//! the teacher's own `prelude` module. `use dspflow::prelude::*;` pulls in
//! the pipeline, stage specification, error, and default scalar types
//! without needing to know which submodule each lives in.

pub use crate::callbacks::Callbacks;
pub use crate::error::{DspError, DspResult};
pub use crate::fft::ComplexSpectrum;
pub use crate::fir::{FilterBand, WindowType};
pub use crate::iir::{BiquadCoefs, LowHigh};
pub use crate::numeric::{Float, Real, Sample};
pub use crate::pipeline::{Pipeline, ProcessOptions, StageSpec};
pub use crate::snapshot::{SnapshotDocument, StateSummary};
pub use crate::stage::RectifyMode;
pub use crate::streaming_fft::FftMode;
