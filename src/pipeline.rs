//! Pipeline runtime: ordered composition of stage adapters, multi-channel
//! dispatch, and snapshot/restore (`spec.md` §4.11, component C11).
//!
//! A pipeline owns its stages exclusively; there are no back-references.
//! `process` walks stages strictly in insertion order with no fusion or
//! reordering (`spec.md` §5). Observability callbacks, when registered, fire
//! once per stage after that stage has finished — never from inside a
//! stage's hot loop.

use std::time::Instant;

use crate::callbacks::Callbacks;
use crate::error::{DspError, DspResult};
use crate::fft::ComplexSpectrum;
use crate::fir::{design_fir, FilterBand, WindowType};
use crate::iir::{
    design_butterworth_biquad, design_chebyshev1_biquad, design_first_order, design_peaking_eq,
    design_shelf, BiquadCoefs, LowHigh,
};
use crate::numeric::{Float, Real};
use crate::snapshot::{SnapshotDocument, StageSnapshot, StateSummary, SCHEMA_VERSION};
use crate::stage::{
    AsAny, FftStage, FirStage, IirStage, MavStage, MovingAverageStage, RectifyMode, RectifyStage,
    RmsStage, Stage, VarianceStage, ZScoreStage,
};
use crate::streaming_fft::FftMode;

/// Options accepted by [`Pipeline::process`] beyond the sample buffer
/// itself (`spec.md` §6's `{ channels, sampleRate? }`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessOptions {
    pub channels: usize,
    pub sample_rate: Option<f64>,
}

/// Declarative description of a stage to add, mirroring `spec.md` §6's
/// `pipeline.addStage(kind, params)` entry point. Each variant's parameters
/// are validated when the stage is actually constructed in
/// [`Pipeline::add_stage`].
pub enum StageSpec<T: Real> {
    MovingAverage {
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
    },
    Rms {
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
    },
    Variance {
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
    },
    ZScore {
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
        epsilon: f64,
    },
    MeanAbsoluteValue {
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
    },
    Rectify {
        mode: RectifyMode,
    },
    Fir {
        coefficients: Vec<T>,
    },
    FirDesign {
        band: FilterBand,
        num_taps: usize,
        cutoff_low: f64,
        cutoff_high: f64,
        window: WindowType,
    },
    Iir {
        b: Vec<T>,
        a: Vec<T>,
    },
    IirFirstOrder {
        band: LowHigh,
        cutoff: f64,
    },
    IirButterworth {
        band: LowHigh,
        cutoff: f64,
        order: u32,
    },
    IirChebyshev1 {
        band: LowHigh,
        cutoff: f64,
        ripple_db: f64,
        order: u32,
    },
    IirPeakingEq {
        cutoff: f64,
        q: f64,
        gain_db: f64,
    },
    IirShelf {
        band: LowHigh,
        cutoff: f64,
        gain_db: f64,
        shelf_slope: f64,
    },
    Fft {
        fft_size: usize,
        mode: FftMode,
        real_input: bool,
        window: WindowType,
    },
}

fn biquad_to_coefs<T: Real>(c: BiquadCoefs<T>) -> (Vec<T>, Vec<T>) {
    (vec![c.b0, c.b1, c.b2], vec![c.a1, c.a2])
}

/// Ordered composition of stages over a declared channel count, with
/// snapshot/restore and observability callbacks (`spec.md` §4.11).
pub struct Pipeline<T: Real + Default> {
    stages: Vec<Box<dyn Stage<T>>>,
    channels: Option<usize>,
    schema_version: String,
    callbacks: Callbacks,
}

impl<T: Real + Default + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real + Default + 'static> Pipeline<T> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            channels: None,
            schema_version: SCHEMA_VERSION.to_string(),
            callbacks: Callbacks::new(),
        }
    }

    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validate and append a stage, constructed from its declarative
    /// [`StageSpec`]. Parameters are validated here (`spec.md` §7's
    /// `InvalidArgument` taxonomy), matching "each construction validates
    /// its parameters" (`spec.md` §3).
    pub fn add_stage(&mut self, spec: StageSpec<T>) -> DspResult<&mut Self> {
        let stage: Box<dyn Stage<T>> = match spec {
            StageSpec::MovingAverage { window_size, window_duration_ms } => {
                Box::new(MovingAverageStage::<T>::new(window_size, window_duration_ms)?)
            }
            StageSpec::Rms { window_size, window_duration_ms } => {
                Box::new(RmsStage::<T>::new(window_size, window_duration_ms)?)
            }
            StageSpec::Variance { window_size, window_duration_ms } => {
                Box::new(VarianceStage::<T>::new(window_size, window_duration_ms)?)
            }
            StageSpec::ZScore { window_size, window_duration_ms, epsilon } => {
                Box::new(ZScoreStage::<T>::new(window_size, window_duration_ms, epsilon)?)
            }
            StageSpec::MeanAbsoluteValue { window_size, window_duration_ms } => {
                Box::new(MavStage::<T>::new(window_size, window_duration_ms)?)
            }
            StageSpec::Rectify { mode } => Box::new(RectifyStage::<T>::new(mode)),
            StageSpec::Fir { coefficients } => Box::new(FirStage::new(coefficients)?),
            StageSpec::FirDesign { band, num_taps, cutoff_low, cutoff_high, window } => {
                let coefficients = design_fir::<T>(band, num_taps, cutoff_low, cutoff_high, window)?;
                Box::new(FirStage::new(coefficients)?)
            }
            StageSpec::Iir { b, a } => Box::new(IirStage::new(b, a)?),
            StageSpec::IirFirstOrder { band, cutoff } => {
                let (b, a) = biquad_to_coefs(design_first_order::<T>(band, cutoff)?);
                Box::new(IirStage::new(b, a)?)
            }
            StageSpec::IirButterworth { band, cutoff, order } => {
                let (b, a) = biquad_to_coefs(design_butterworth_biquad::<T>(band, cutoff, order)?);
                Box::new(IirStage::new(b, a)?)
            }
            StageSpec::IirChebyshev1 { band, cutoff, ripple_db, order } => {
                let (b, a) = biquad_to_coefs(design_chebyshev1_biquad::<T>(band, cutoff, ripple_db, order)?);
                Box::new(IirStage::new(b, a)?)
            }
            StageSpec::IirPeakingEq { cutoff, q, gain_db } => {
                let (b, a) = biquad_to_coefs(design_peaking_eq::<T>(cutoff, q, gain_db)?);
                Box::new(IirStage::new(b, a)?)
            }
            StageSpec::IirShelf { band, cutoff, gain_db, shelf_slope } => {
                let (b, a) = biquad_to_coefs(design_shelf::<T>(band, cutoff, gain_db, shelf_slope)?);
                Box::new(IirStage::new(b, a)?)
            }
            StageSpec::Fft { fft_size, mode, real_input, window } => {
                Box::new(FftStage::<T>::new(fft_size, mode, real_input, window)?)
            }
        };
        self.stages.push(stage);
        Ok(self)
    }

    fn synthesize_timestamps(frames: usize, sample_rate: Option<f64>) -> Vec<f64> {
        match sample_rate {
            Some(rate) if rate > 0.0 => (0..frames).map(|f| f as f64 * 1000.0 / rate).collect(),
            _ => (0..frames).map(|f| f as f64).collect(),
        }
    }

    /// Validate shape, synthesize timestamps if needed, then walk every
    /// stage in order, transforming `samples` in place (`spec.md` §4.11).
    pub fn process(
        &mut self,
        samples: &mut [T],
        timestamps: Option<&[f64]>,
        options: ProcessOptions,
    ) -> DspResult<()> {
        if timestamps.is_some() && options.sample_rate.is_some() {
            return Err(DspError::ArgumentConflict {
                stage: "pipeline".into(),
            });
        }
        let channels = match self.channels {
            Some(c) => {
                if c != options.channels {
                    return Err(DspError::ShapeMismatch {
                        stage: "pipeline".into(),
                        reason: format!(
                            "declared channel count {} does not match {}",
                            c, options.channels
                        ),
                    });
                }
                c
            }
            None => {
                self.channels = Some(options.channels);
                options.channels
            }
        };
        if channels == 0 || samples.len() % channels != 0 {
            return Err(DspError::ShapeMismatch {
                stage: "pipeline".into(),
                reason: format!(
                    "sample buffer length {} is not a multiple of channel count {}",
                    samples.len(),
                    channels
                ),
            });
        }
        let frames = samples.len() / channels;

        let owned_timestamps;
        let ts: &[f64] = match timestamps {
            Some(ts) => {
                if ts.len() != frames {
                    return Err(DspError::ShapeMismatch {
                        stage: "pipeline".into(),
                        reason: format!(
                            "timestamp count {} does not match frame count {}",
                            ts.len(),
                            frames
                        ),
                    });
                }
                ts
            }
            None => {
                owned_timestamps = Self::synthesize_timestamps(frames, options.sample_rate);
                &owned_timestamps
            }
        };

        for stage in self.stages.iter_mut() {
            let start = Instant::now();
            let name = stage.name();
            let result = stage.process(samples, Some(ts), frames, channels);
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            match result {
                Ok(()) => {
                    self.callbacks.fire_stage_complete(name, duration_ms);
                    // `onBatch` is registration-gated: building the f32 copy
                    // costs an allocation, so callers that leave it unset pay
                    // nothing for it.
                    if self.callbacks.on_batch.is_some() {
                        let batch: Vec<f32> = samples.iter().map(|&x| x.to_f64() as f32).collect();
                        self.callbacks.fire_batch(name, &batch, 0);
                    }
                }
                Err(e) => {
                    self.callbacks.fire_error(name, &e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// The per-channel spectrum most recently computed by the `fft` stage at
    /// `stage_index`, or `None` if that index isn't an FFT stage, the
    /// channel is out of range, or no emission frame has occurred yet.
    /// Since an FFT changes a block's representation rather than its length,
    /// this is how the pipeline's public API surfaces a spectrum instead of
    /// mutating `samples` (`spec.md` §4.9/§4.10).
    pub fn fft_spectrum(&self, stage_index: usize, channel: usize) -> Option<&ComplexSpectrum<T>> {
        self.stages
            .get(stage_index)?
            .as_any()
            .downcast_ref::<FftStage<T>>()?
            .spectrum(channel)
    }

    /// Allocate a working copy of `samples`, run [`Pipeline::process`] on
    /// it, and return the result; the original buffer is left untouched.
    pub fn process_copy(
        &mut self,
        samples: &[T],
        timestamps: Option<&[f64]>,
        options: ProcessOptions,
    ) -> DspResult<Vec<T>> {
        let mut copy = samples.to_vec();
        self.process(&mut copy, timestamps, options)?;
        Ok(copy)
    }

    /// Reset every stage's per-channel state; the declared channel count and
    /// stage list are unaffected.
    pub fn clear_state(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    /// Build the full, self-describing snapshot document (`spec.md` §4.11 /
    /// §6). `captured_at_ms` is supplied by the caller: the core never reads
    /// the system clock (`spec.md` §6 "Environment").
    pub fn save_state(&self, captured_at_ms: u64) -> SnapshotDocument<T> {
        SnapshotDocument {
            schema_version: self.schema_version.clone(),
            captured_at: captured_at_ms,
            channels: self.channels.unwrap_or(0) as u32,
            stages: self
                .stages
                .iter()
                .enumerate()
                .map(|(index, stage)| StageSnapshot {
                    index: index as u32,
                    name: stage.name().to_string(),
                    params: stage.params(),
                    state: stage.export(),
                })
                .collect(),
        }
    }

    /// Compact structural summary with per-channel buffer contents stripped
    /// (`spec.md` §4.11 `listState`), for logging/UI.
    pub fn list_state(&self, captured_at_ms: u64) -> StateSummary<T> {
        self.save_state(captured_at_ms).summarize()
    }

    /// Restore a snapshot into this pipeline. The pipeline must already be
    /// structurally identical (same stages, same order, same parameters,
    /// same schema version) — a mismatch fails with `StateIncompatible` and
    /// leaves the pipeline untouched (`spec.md` §4.11, transactional
    /// all-or-nothing restore).
    pub fn load_state(&mut self, doc: &SnapshotDocument<T>) -> DspResult<()> {
        if doc.schema_version != self.schema_version {
            return Err(DspError::StateCorrupted {
                index: 0,
                channel: 0,
                field: "schemaVersion".into(),
                reason: format!(
                    "expected {}, found {}",
                    self.schema_version, doc.schema_version
                ),
            });
        }
        if doc.stages.len() != self.stages.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "stageCount".into(),
                expected: self.stages.len().to_string(),
                found: doc.stages.len().to_string(),
            });
        }
        for (index, (stage, snap)) in self.stages.iter().zip(&doc.stages).enumerate() {
            if stage.name() != snap.name {
                return Err(DspError::StateIncompatible {
                    index,
                    field: "name".into(),
                    expected: stage.name().to_string(),
                    found: snap.name.clone(),
                });
            }
            let live = stage.params();
            if live != snap.params {
                return Err(DspError::StateIncompatible {
                    index,
                    field: "params".into(),
                    expected: format!("{:?}", live),
                    found: format!("{:?}", snap.params),
                });
            }
        }

        // All structural checks passed. `import` is transactional per
        // `spec.md` §4.11 ("on failure, the pipeline remains in its
        // pre-import state"): take a backup snapshot of the live state
        // first, attempt every stage's import in place, and roll back to
        // the backup if any stage fails (e.g. a `StateCorrupted` tolerance
        // check). The backup import is expected to always succeed since it
        // was produced by `export()` moments earlier.
        let backup: Vec<_> = self.stages.iter().map(|s| s.export()).collect();
        let mut failure = None;
        for (index, (stage, snap)) in self.stages.iter_mut().zip(&doc.stages).enumerate() {
            if let Err(e) = stage.import(&snap.state) {
                let e = match e {
                    DspError::StateCorrupted { channel, field, reason, .. } => {
                        DspError::StateCorrupted { index, channel, field, reason }
                    }
                    DspError::StateIncompatible { field, expected, found, .. } => {
                        DspError::StateIncompatible { index, field, expected, found }
                    }
                    other => other,
                };
                failure = Some(e);
                break;
            }
        }
        if let Some(e) = failure {
            for (stage, snap) in self.stages.iter_mut().zip(&backup) {
                stage
                    .import(snap)
                    .expect("rolling back to a just-exported backup must always succeed");
            }
            return Err(e);
        }
        self.channels = Some(doc.channels as usize);
        Ok(())
    }
}
