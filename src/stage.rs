//! Stage adapters: the uniform per-stage interface the pipeline runtime
//! composes over the sliding-window, FIR, IIR, and streaming-FFT kernels.
//!
//! Every stage presents the same four-method contract (`process`, `reset`,
//! `name`, `export`/`import`) and owns one independent kernel instance per
//! channel — channels never share state. Dispatch is an open interface
//! table (`Box<dyn Stage<T>>`), the same trait-object shape the teacher
//! uses for its own polymorphic node type; a closed tagged-union would work
//! equally well per the design notes, but a trait object keeps each stage
//! kind's state private to its own module.

use crate::error::{DspError, DspResult};
use crate::fft::ComplexSpectrum;
use crate::fir::{FirKernel, WindowType};
use crate::iir::IirKernel;
use crate::numeric::{Float, Real};
use crate::reducer::{
    MeanAbsPolicy, MeanPolicy, ReducerPolicy, RmsPolicy, VariancePolicy, ZScorePolicy,
};
use crate::snapshot::{ChannelSnapshot, StageParams, StageState};
use crate::streaming_fft::{FftMode, MovingFftFilter};
use crate::window::{CountWindowFilter, TimeWindowFilter};

/// Lets a `Box<dyn Stage<T>>` be downcast back to its concrete type, the
/// standard blanket-impl workaround for `Any` through a non-`Any` trait
/// object. `Pipeline::fft_spectrum` uses this to reach `FftStage`'s retained
/// spectrum, which has no natural same-shape in-place representation.
pub trait AsAny {
    fn as_any(&self) -> &dyn std::any::Any;
}

impl<U: std::any::Any> AsAny for U {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// The uniform stage contract. `process` transforms `samples` in place;
/// `frames = samples.len() / channels` and `timestamps`, when present, has
/// exactly `frames` entries (the pipeline guarantees both before calling
/// any stage).
pub trait Stage<T: Real>: Send + AsAny {
    fn process(
        &mut self,
        samples: &mut [T],
        timestamps: Option<&[f64]>,
        frames: usize,
        channels: usize,
    ) -> DspResult<()>;

    fn reset(&mut self);

    /// Stable wire tag used in the snapshot document, e.g. `"movingAverage"`.
    fn name(&self) -> &'static str;

    fn export(&self) -> StageState<T>;
    fn params(&self) -> StageParams<T>;

    /// Reconstruct per-channel kernels bitwise from a snapshot. The caller
    /// (`Pipeline::load_state`) has already checked `params()` equality and
    /// the channel count; this only rebuilds buffers/aggregates/history.
    fn import(&mut self, state: &StageState<T>) -> DspResult<()>;
}

/// Placeholder ring capacity for a time-based window before the
/// mean-inter-sample-interval estimate resolves (§4.10's heuristic).
/// Generous enough that the first ~16 frames of a typical stream are never
/// silently dropped while the estimate is still accumulating.
const DEFAULT_TIME_CAPACITY: usize = 64;

/// Collects the first `SAMPLE_TARGET` positive inter-sample intervals, then
/// resolves a one-shot capacity estimate for a time-based window:
/// `ceil(windowDuration / meanInterval) * safety_margin`. Never re-resolves
/// once it has (§9: "the capacity-from-mean-interval estimate... is a
/// heuristic"; amortized growth rather than re-estimation is acceptable,
/// and growth-only is what `TimeWindowFilter::grow_capacity` supports).
#[derive(Clone, Debug)]
struct TimeCapacityEstimator {
    last_t: Option<f64>,
    intervals: Vec<f64>,
    resolved: bool,
}

impl TimeCapacityEstimator {
    const SAMPLE_TARGET: usize = 16;
    const SAFETY_MARGIN: f64 = 1.5;

    fn pending() -> Self {
        Self {
            last_t: None,
            intervals: Vec::with_capacity(Self::SAMPLE_TARGET),
            resolved: false,
        }
    }

    /// Already resolved: used when the caller supplied an explicit
    /// `windowSize` alongside `windowDuration`, in which case the explicit
    /// capacity is authoritative and the heuristic never runs.
    fn resolved() -> Self {
        Self {
            last_t: None,
            intervals: Vec::new(),
            resolved: true,
        }
    }

    fn observe(&mut self, t: f64, window_duration_ms: f64) -> Option<usize> {
        if self.resolved {
            return None;
        }
        if let Some(last) = self.last_t {
            let dt = t - last;
            if dt > 0.0 {
                self.intervals.push(dt);
            }
        }
        self.last_t = Some(t);
        if self.intervals.len() < Self::SAMPLE_TARGET {
            return None;
        }
        self.resolved = true;
        let mean: f64 = self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        let capacity = ((window_duration_ms / mean).ceil() * Self::SAFETY_MARGIN).ceil();
        Some((capacity as usize).max(1))
    }
}

enum WindowChannel<T: Float + Default, P: ReducerPolicy<T> + Clone> {
    Count(CountWindowFilter<T, P>),
    Time {
        filter: TimeWindowFilter<T, P>,
        estimator: TimeCapacityEstimator,
        window_duration_ms: f64,
    },
}

impl<T: Float + Default, P: ReducerPolicy<T> + Clone> WindowChannel<T, P> {
    fn push(&mut self, x: T, t: Option<f64>, stage: &'static str) -> DspResult<T> {
        match self {
            WindowChannel::Count(f) => Ok(f.push(x)),
            WindowChannel::Time {
                filter,
                estimator,
                window_duration_ms,
            } => {
                let t = t.ok_or_else(|| DspError::InvalidOperation {
                    stage: stage.into(),
                    reason: "time-based window stage requires per-frame timestamps".into(),
                })?;
                if let Some(new_capacity) = estimator.observe(t, *window_duration_ms) {
                    log::debug!(
                        "{stage}: resizing time window capacity to {new_capacity} frames after interval estimation"
                    );
                    filter.grow_capacity(new_capacity);
                }
                Ok(filter.push(t, x))
            }
        }
    }

    fn reset(&mut self) {
        match self {
            WindowChannel::Count(f) => f.reset(),
            WindowChannel::Time {
                filter, estimator, ..
            } => {
                filter.reset();
                *estimator = TimeCapacityEstimator::pending();
            }
        }
    }

    fn export(&self) -> ChannelSnapshot<T> {
        match self {
            WindowChannel::Count(f) => ChannelSnapshot {
                buffer: f.buffer_snapshot(),
                aggregates: Some(f.aggregate_snapshot()),
                ..Default::default()
            },
            WindowChannel::Time { filter, .. } => {
                let pairs = filter.buffer_snapshot();
                let mut ts = Vec::with_capacity(pairs.len());
                let mut xs = Vec::with_capacity(pairs.len());
                for (t, x) in pairs {
                    ts.push(t);
                    xs.push(x);
                }
                ChannelSnapshot {
                    buffer: xs,
                    timestamps: Some(ts),
                    aggregates: Some(filter.aggregate_snapshot()),
                    ..Default::default()
                }
            }
        }
    }

    fn import(&mut self, snap: &ChannelSnapshot<T>) -> DspResult<()> {
        let aggregate = snap.aggregates.clone().unwrap_or_default();
        match self {
            WindowChannel::Count(f) => f.restore(&snap.buffer, &aggregate),
            WindowChannel::Time { filter, .. } => {
                let ts = snap.timestamps.as_deref().unwrap_or(&[]);
                if ts.len() != snap.buffer.len() {
                    return Err(DspError::StateIncompatible {
                        index: 0,
                        field: "window.timestamps".into(),
                        expected: snap.buffer.len().to_string(),
                        found: ts.len().to_string(),
                    });
                }
                let pairs: Vec<(f64, T)> = ts.iter().copied().zip(snap.buffer.iter().copied()).collect();
                filter.restore(&pairs, &aggregate)
            }
        }
    }
}

/// Shared implementation behind the five reducer-backed window stages
/// (`movingAverage`, `rms`, `variance`, `zScoreNormalize`, `mav`); only the
/// reducer policy and wire name differ between them.
pub struct WindowStage<T: Float + Default, P: ReducerPolicy<T> + Clone> {
    wire_name: &'static str,
    window_size: Option<usize>,
    window_duration_ms: Option<f64>,
    epsilon: Option<f64>,
    make_policy: Box<dyn Fn() -> P + Send + Sync>,
    channels: Vec<WindowChannel<T, P>>,
}

impl<T: Float + Default, P: ReducerPolicy<T> + Clone> WindowStage<T, P> {
    fn new(
        wire_name: &'static str,
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
        epsilon: Option<f64>,
        make_policy: Box<dyn Fn() -> P + Send + Sync>,
    ) -> DspResult<Self> {
        if window_size.is_none() && window_duration_ms.is_none() {
            return Err(DspError::InvalidArgument {
                stage: wire_name.into(),
                parameter: "windowSize/windowDuration".into(),
                reason: "at least one of windowSize or windowDuration must be supplied".into(),
            });
        }
        if window_size == Some(0) {
            return Err(DspError::InvalidArgument {
                stage: wire_name.into(),
                parameter: "windowSize".into(),
                reason: "window size must be nonzero".into(),
            });
        }
        Ok(Self {
            wire_name,
            window_size,
            window_duration_ms,
            epsilon,
            make_policy,
            channels: Vec::new(),
        })
    }

    fn make_channel(&self) -> WindowChannel<T, P> {
        match self.window_duration_ms {
            Some(duration) => match self.window_size {
                Some(cap) => WindowChannel::Time {
                    filter: TimeWindowFilter::new(cap, duration, (self.make_policy)()),
                    estimator: TimeCapacityEstimator::resolved(),
                    window_duration_ms: duration,
                },
                None => WindowChannel::Time {
                    filter: TimeWindowFilter::new(DEFAULT_TIME_CAPACITY, duration, (self.make_policy)()),
                    estimator: TimeCapacityEstimator::pending(),
                    window_duration_ms: duration,
                },
            },
            None => WindowChannel::Count(CountWindowFilter::new(
                self.window_size.expect("validated at construction"),
                (self.make_policy)(),
            )),
        }
    }

    fn ensure_channels(&mut self, channels: usize) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..channels).map(|_| self.make_channel()).collect();
        } else if self.channels.len() != channels {
            return Err(DspError::ShapeMismatch {
                stage: self.wire_name.into(),
                reason: format!(
                    "channel count changed from {} to {}",
                    self.channels.len(),
                    channels
                ),
            });
        }
        Ok(())
    }
}

impl<T: Real + Default, P: ReducerPolicy<T> + Clone + Send + 'static> Stage<T> for WindowStage<T, P> {
    fn process(
        &mut self,
        samples: &mut [T],
        timestamps: Option<&[f64]>,
        frames: usize,
        channels: usize,
    ) -> DspResult<()> {
        self.ensure_channels(channels)?;
        for c in 0..channels {
            for f in 0..frames {
                let idx = c + f * channels;
                let t = timestamps.map(|ts| ts[f]);
                let x = samples[idx];
                samples[idx] = self.channels[c].push(x, t, self.wire_name)?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
    }

    fn name(&self) -> &'static str {
        self.wire_name
    }

    fn export(&self) -> StageState<T> {
        StageState {
            num_channels: self.channels.len() as u32,
            channels: self.channels.iter().map(WindowChannel::export).collect(),
        }
    }

    fn params(&self) -> StageParams<T> {
        StageParams {
            window_size: self.window_size,
            window_duration: self.window_duration_ms,
            epsilon: self.epsilon,
            ..Default::default()
        }
    }

    fn import(&mut self, state: &StageState<T>) -> DspResult<()> {
        if state.channels.len() != self.channels.len() {
            if self.channels.is_empty() {
                self.channels = (0..state.channels.len())
                    .map(|_| self.make_channel())
                    .collect();
            } else {
                return Err(DspError::StateIncompatible {
                    index: 0,
                    field: "numChannels".into(),
                    expected: self.channels.len().to_string(),
                    found: state.channels.len().to_string(),
                });
            }
        }
        for (channel, (ch, snap)) in self.channels.iter_mut().zip(&state.channels).enumerate() {
            ch.import(snap).map_err(|e| match e {
                DspError::StateCorrupted { field, reason, .. } => {
                    DspError::StateCorrupted { index: 0, channel, field, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

pub type MovingAverageStage<T> = WindowStage<T, MeanPolicy>;
pub type RmsStage<T> = WindowStage<T, RmsPolicy>;
pub type VarianceStage<T> = WindowStage<T, VariancePolicy>;
pub type MavStage<T> = WindowStage<T, MeanAbsPolicy>;
pub type ZScoreStage<T> = WindowStage<T, ZScorePolicy>;

impl<T: Float + Default> MovingAverageStage<T> {
    pub fn new(window_size: Option<usize>, window_duration_ms: Option<f64>) -> DspResult<Self> {
        WindowStage::new(
            "movingAverage",
            window_size,
            window_duration_ms,
            None,
            Box::new(MeanPolicy::default),
        )
    }
}

impl<T: Float + Default> RmsStage<T> {
    pub fn new(window_size: Option<usize>, window_duration_ms: Option<f64>) -> DspResult<Self> {
        WindowStage::new(
            "rms",
            window_size,
            window_duration_ms,
            None,
            Box::new(RmsPolicy::default),
        )
    }
}

impl<T: Float + Default> VarianceStage<T> {
    pub fn new(window_size: Option<usize>, window_duration_ms: Option<f64>) -> DspResult<Self> {
        WindowStage::new(
            "variance",
            window_size,
            window_duration_ms,
            None,
            Box::new(VariancePolicy::default),
        )
    }
}

impl<T: Float + Default> MavStage<T> {
    pub fn new(window_size: Option<usize>, window_duration_ms: Option<f64>) -> DspResult<Self> {
        WindowStage::new(
            "mav",
            window_size,
            window_duration_ms,
            None,
            Box::new(MeanAbsPolicy::default),
        )
    }
}

impl<T: Float + Default> ZScoreStage<T> {
    pub fn new(
        window_size: Option<usize>,
        window_duration_ms: Option<f64>,
        epsilon: f64,
    ) -> DspResult<Self> {
        WindowStage::new(
            "zScoreNormalize",
            window_size,
            window_duration_ms,
            Some(epsilon),
            Box::new(move || ZScorePolicy::new(epsilon)),
        )
    }
}

/// `full` (`|x|`) or `half` (`max(x, 0)`) rectification. Stateless — there
/// is no buffer or aggregate to persist, so `export`/`import` only carry
/// the channel count for structural validation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RectifyMode {
    Full,
    Half,
}

pub struct RectifyStage<T> {
    mode: RectifyMode,
    channels: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> RectifyStage<T> {
    pub fn new(mode: RectifyMode) -> Self {
        Self {
            mode,
            channels: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Real> Stage<T> for RectifyStage<T> {
    fn process(
        &mut self,
        samples: &mut [T],
        _timestamps: Option<&[f64]>,
        _frames: usize,
        channels: usize,
    ) -> DspResult<()> {
        self.channels = channels;
        match self.mode {
            RectifyMode::Full => {
                for x in samples.iter_mut() {
                    *x = x.abs();
                }
            }
            RectifyMode::Half => {
                for x in samples.iter_mut() {
                    *x = x.max(T::zero());
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "rectify"
    }

    fn export(&self) -> StageState<T> {
        StageState {
            num_channels: self.channels as u32,
            channels: (0..self.channels).map(|_| ChannelSnapshot::default()).collect(),
        }
    }

    fn params(&self) -> StageParams<T> {
        StageParams {
            mode: Some(match self.mode {
                RectifyMode::Full => "full".into(),
                RectifyMode::Half => "half".into(),
            }),
            ..Default::default()
        }
    }

    fn import(&mut self, state: &StageState<T>) -> DspResult<()> {
        self.channels = state.num_channels as usize;
        Ok(())
    }
}

/// Stateful streaming FIR, one [`FirKernel`] per channel. The kernel's own
/// stateless batch mode (see [`crate::fir::FirKernel::process`]) is
/// available for direct use but is not exercised through this adapter: a
/// pipeline stage's whole purpose is persistent streaming state, so
/// `Stage::process` always advances the per-channel delay line.
pub struct FirStage<T: Float> {
    taps: Vec<T>,
    channels: Vec<FirKernel<T>>,
}

impl<T: Float> FirStage<T> {
    pub fn new(taps: Vec<T>) -> DspResult<Self> {
        if taps.is_empty() {
            return Err(DspError::InvalidArgument {
                stage: "fir".into(),
                parameter: "coefficients".into(),
                reason: "coefficient vector must not be empty".into(),
            });
        }
        Ok(Self {
            taps,
            channels: Vec::new(),
        })
    }
}

impl<T: Real> Stage<T> for FirStage<T> {
    fn process(
        &mut self,
        samples: &mut [T],
        _timestamps: Option<&[f64]>,
        frames: usize,
        channels: usize,
    ) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..channels)
                .map(|_| FirKernel::new(self.taps.clone()).expect("taps validated at construction"))
                .collect();
        } else if self.channels.len() != channels {
            return Err(DspError::ShapeMismatch {
                stage: "fir".into(),
                reason: format!(
                    "channel count changed from {} to {}",
                    self.channels.len(),
                    channels
                ),
            });
        }
        for c in 0..channels {
            for f in 0..frames {
                let idx = c + f * channels;
                samples[idx] = self.channels[c].process_sample(samples[idx]);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for k in &mut self.channels {
            k.reset();
        }
    }

    fn name(&self) -> &'static str {
        "fir"
    }

    fn export(&self) -> StageState<T> {
        StageState {
            num_channels: self.channels.len() as u32,
            channels: self
                .channels
                .iter()
                .map(|k| ChannelSnapshot {
                    buffer: k.delay_line(),
                    position: Some(k.position() as u64),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn params(&self) -> StageParams<T> {
        StageParams {
            coefficients: Some(self.taps.clone()),
            ..Default::default()
        }
    }

    fn import(&mut self, state: &StageState<T>) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..state.channels.len())
                .map(|_| FirKernel::new(self.taps.clone()).expect("taps validated at construction"))
                .collect();
        }
        if self.channels.len() != state.channels.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "numChannels".into(),
                expected: self.channels.len().to_string(),
                found: state.channels.len().to_string(),
            });
        }
        for (k, snap) in self.channels.iter_mut().zip(&state.channels) {
            let pos = snap.position.unwrap_or(0) as usize;
            k.restore(self.taps.clone(), snap.buffer.clone(), pos)?;
        }
        Ok(())
    }
}

/// Stateful streaming IIR, one [`IirKernel`] per channel.
pub struct IirStage<T: Real> {
    b: Vec<T>,
    a: Vec<T>,
    channels: Vec<IirKernel<T>>,
}

impl<T: Real> IirStage<T> {
    pub fn new(b: Vec<T>, a: Vec<T>) -> DspResult<Self> {
        if b.is_empty() {
            return Err(DspError::InvalidArgument {
                stage: "iir".into(),
                parameter: "b".into(),
                reason: "feedforward coefficient vector must not be empty".into(),
            });
        }
        Ok(Self {
            b,
            a,
            channels: Vec::new(),
        })
    }
}

impl<T: Real> Stage<T> for IirStage<T> {
    fn process(
        &mut self,
        samples: &mut [T],
        _timestamps: Option<&[f64]>,
        frames: usize,
        channels: usize,
    ) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..channels)
                .map(|_| {
                    IirKernel::new(self.b.clone(), self.a.clone())
                        .expect("coefficients validated at construction")
                })
                .collect();
        } else if self.channels.len() != channels {
            return Err(DspError::ShapeMismatch {
                stage: "iir".into(),
                reason: format!(
                    "channel count changed from {} to {}",
                    self.channels.len(),
                    channels
                ),
            });
        }
        for c in 0..channels {
            for f in 0..frames {
                let idx = c + f * channels;
                samples[idx] = self.channels[c].process_sample(samples[idx]);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for k in &mut self.channels {
            k.reset();
        }
    }

    fn name(&self) -> &'static str {
        "iir"
    }

    fn export(&self) -> StageState<T> {
        StageState {
            num_channels: self.channels.len() as u32,
            channels: self
                .channels
                .iter()
                .map(|k| ChannelSnapshot {
                    buffer: k.input_history(),
                    output_history: Some(k.output_history()),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn params(&self) -> StageParams<T> {
        StageParams {
            coefficients: Some(self.b.clone()),
            feedback_coefficients: Some(self.a.clone()),
            ..Default::default()
        }
    }

    fn import(&mut self, state: &StageState<T>) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..state.channels.len())
                .map(|_| {
                    IirKernel::new(self.b.clone(), self.a.clone())
                        .expect("coefficients validated at construction")
                })
                .collect();
        }
        if self.channels.len() != state.channels.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "numChannels".into(),
                expected: self.channels.len().to_string(),
                found: state.channels.len().to_string(),
            });
        }
        for (k, snap) in self.channels.iter_mut().zip(&state.channels) {
            let y_hist = snap.output_history.clone().unwrap_or_default();
            k.restore(self.b.clone(), self.a.clone(), snap.buffer.clone(), y_hist)?;
        }
        Ok(())
    }
}

/// Windowed streaming FFT stage. Samples pass through the buffer
/// unmodified (an FFT changes a block's *representation*, not its length,
/// so there is no natural same-shape in-place output); the per-channel
/// spectrum computed on an emission frame is retained and readable via
/// [`FftStage::spectrum`] — the pipeline surfaces it to callers through
/// [`crate::pipeline::Pipeline::fft_spectrum`] and through the `onBatch`
/// observability callback rather than by mutating `samples`.
pub struct FftStage<T: Real + Default> {
    fft_size: usize,
    mode: FftMode,
    real_input: bool,
    window_type: WindowType,
    channels: Vec<MovingFftFilter<T>>,
    last_spectrum: Vec<Option<ComplexSpectrum<T>>>,
}

impl<T: Real + Default> FftStage<T> {
    pub fn new(fft_size: usize, mode: FftMode, real_input: bool, window_type: WindowType) -> DspResult<Self> {
        if fft_size == 0 {
            return Err(DspError::InvalidArgument {
                stage: "fft".into(),
                parameter: "fftSize".into(),
                reason: "FFT size must be nonzero".into(),
            });
        }
        Ok(Self {
            fft_size,
            mode,
            real_input,
            window_type,
            channels: Vec::new(),
            last_spectrum: Vec::new(),
        })
    }

    pub fn spectrum(&self, channel: usize) -> Option<&ComplexSpectrum<T>> {
        self.last_spectrum.get(channel).and_then(|s| s.as_ref())
    }
}

impl<T: Real + Default> Stage<T> for FftStage<T> {
    fn process(
        &mut self,
        samples: &mut [T],
        _timestamps: Option<&[f64]>,
        frames: usize,
        channels: usize,
    ) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..channels)
                .map(|_| MovingFftFilter::new(self.fft_size, self.mode, self.real_input, self.window_type))
                .collect();
            self.last_spectrum = (0..channels).map(|_| None).collect();
        } else if self.channels.len() != channels {
            return Err(DspError::ShapeMismatch {
                stage: "fft".into(),
                reason: format!(
                    "channel count changed from {} to {}",
                    self.channels.len(),
                    channels
                ),
            });
        }
        for c in 0..channels {
            for f in 0..frames {
                let idx = c + f * channels;
                if let Some(spectrum) = self.channels[c].push(samples[idx]) {
                    self.last_spectrum[c] = Some(spectrum);
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        for k in &mut self.channels {
            k.reset();
        }
        for s in &mut self.last_spectrum {
            *s = None;
        }
    }

    fn name(&self) -> &'static str {
        "fft"
    }

    fn export(&self) -> StageState<T> {
        StageState {
            num_channels: self.channels.len() as u32,
            channels: self
                .channels
                .iter()
                .map(|k| ChannelSnapshot {
                    buffer: k.buffer_snapshot(),
                    ready_pushes: Some(k.ready_pushes()),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn params(&self) -> StageParams<T> {
        StageParams {
            fft_size: Some(self.fft_size),
            hop_size: match self.mode {
                FftMode::Moving => None,
                FftMode::Batched { hop_size } => Some(hop_size),
            },
            mode: Some(
                match self.mode {
                    FftMode::Moving => "moving",
                    FftMode::Batched { .. } => "batched",
                }
                .into(),
            ),
            window_type: Some(format!("{:?}", self.window_type)),
            real_input: Some(self.real_input),
            ..Default::default()
        }
    }

    fn import(&mut self, state: &StageState<T>) -> DspResult<()> {
        if self.channels.is_empty() {
            self.channels = (0..state.channels.len())
                .map(|_| MovingFftFilter::new(self.fft_size, self.mode, self.real_input, self.window_type))
                .collect();
            self.last_spectrum = (0..state.channels.len()).map(|_| None).collect();
        }
        if self.channels.len() != state.channels.len() {
            return Err(DspError::StateIncompatible {
                index: 0,
                field: "numChannels".into(),
                expected: self.channels.len().to_string(),
                found: state.channels.len().to_string(),
            });
        }
        for (index, (k, snap)) in self.channels.iter_mut().zip(&state.channels).enumerate() {
            let ready_pushes = snap.ready_pushes.ok_or_else(|| DspError::StateCorrupted {
                index: 0,
                channel: index,
                field: "readyPushes".into(),
                reason: "streaming-FFT channel snapshot is missing its hop counter".into(),
            })?;
            k.restore(&snap.buffer, ready_pushes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_stage_matches_window_test_vector() {
        let mut stage = MovingAverageStage::<f32>::new(Some(3), None).unwrap();
        let mut samples = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        stage.process(&mut samples, None, 5, 1).unwrap();
        assert_eq!(samples, [1.0, 1.5, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn channels_are_independent() {
        let mut stage = MovingAverageStage::<f32>::new(Some(2), None).unwrap();
        let mut samples = [1.0f32, 100.0, 2.0, 100.0, 3.0, 100.0];
        stage.process(&mut samples, None, 3, 2).unwrap();
        assert_eq!(samples[1], 100.0);
        assert_eq!(samples[5], 100.0);
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[4], 2.5);
    }

    #[test]
    fn rectify_full_takes_absolute_value() {
        let mut stage = RectifyStage::<f32>::new(RectifyMode::Full);
        let mut samples = [-1.0f32, 2.0, -3.0];
        stage.process(&mut samples, None, 3, 1).unwrap();
        assert_eq!(samples, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn rectify_half_zeroes_negatives() {
        let mut stage = RectifyStage::<f32>::new(RectifyMode::Half);
        let mut samples = [-1.0f32, 2.0, -3.0];
        stage.process(&mut samples, None, 3, 1).unwrap();
        assert_eq!(samples, [0.0, 2.0, 0.0]);
    }

    #[test]
    fn fir_stage_snapshot_round_trip_continues_stream() {
        let mut a = FirStage::<f32>::new(vec![0.5, 0.25, 0.25]).unwrap();
        let mut input = [1.0f32, 2.0, 3.0];
        a.process(&mut input, None, 3, 1).unwrap();
        let state = a.export();

        let mut b = FirStage::<f32>::new(vec![0.5, 0.25, 0.25]).unwrap();
        b.import(&state).unwrap();

        let mut tail_a = [4.0f32, 5.0];
        let mut tail_b = tail_a;
        a.process(&mut tail_a, None, 2, 1).unwrap();
        b.process(&mut tail_b, None, 2, 1).unwrap();
        assert_eq!(tail_a, tail_b);
    }

    #[test]
    fn fft_stage_leaves_samples_unchanged_and_records_spectrum() {
        let mut stage =
            FftStage::<f32>::new(4, FftMode::Moving, true, WindowType::Rectangular).unwrap();
        let mut samples = [1.0f32, 2.0, 3.0, 4.0];
        let original = samples;
        stage.process(&mut samples, None, 4, 1).unwrap();
        assert_eq!(samples, original);
        assert!(stage.spectrum(0).is_some());
    }

    #[test]
    fn fft_stage_snapshot_round_trip_preserves_hop_phase() {
        let mode = FftMode::Batched { hop_size: 2 };

        // Reference: a single stage driven continuously through all six
        // samples without any snapshot/restore in the middle.
        let mut whole = FftStage::<f32>::new(4, mode, true, WindowType::Rectangular).unwrap();
        let mut all = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        whole.process(&mut all, None, 6, 1).unwrap();
        let expected = whole.spectrum(0).cloned();

        // Split: snapshot after the first five samples (ready_pushes=2,
        // mid-hop), restore into a fresh stage, then feed it the sixth
        // sample. If the hop phase round-trips correctly this must land on
        // the same emission and produce the same spectrum as `whole`.
        let mut a = FftStage::<f32>::new(4, mode, true, WindowType::Rectangular).unwrap();
        let mut first = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        a.process(&mut first, None, 5, 1).unwrap();
        let state = a.export();
        assert_eq!(state.channels[0].ready_pushes, Some(2));

        let mut b = FftStage::<f32>::new(4, mode, true, WindowType::Rectangular).unwrap();
        b.import(&state).unwrap();
        let mut tail = [6.0f32];
        b.process(&mut tail, None, 1, 1).unwrap();

        assert_eq!(b.spectrum(0).cloned(), expected);
    }

    #[test]
    fn fft_stage_import_rejects_snapshot_missing_hop_counter() {
        let mut a = FftStage::<f32>::new(4, FftMode::Moving, true, WindowType::Rectangular).unwrap();
        let mut input = [1.0f32, 2.0, 3.0, 4.0];
        a.process(&mut input, None, 4, 1).unwrap();
        let mut state = a.export();
        state.channels[0].ready_pushes = None;

        let mut b = FftStage::<f32>::new(4, FftMode::Moving, true, WindowType::Rectangular).unwrap();
        assert!(matches!(
            b.import(&state),
            Err(DspError::StateCorrupted { .. })
        ));
    }

    #[test]
    fn time_based_window_stage_matches_irregular_timestamp_vector() {
        let mut stage = MovingAverageStage::<f32>::new(None, Some(500.0)).unwrap();
        let mut samples = [10.0f32, 20.0, 30.0, 40.0];
        let timestamps = [0.0, 50.0, 600.0, 650.0];
        stage.process(&mut samples, Some(&timestamps), 4, 1).unwrap();
        assert_eq!(samples, [10.0, 15.0, 30.0, 35.0]);
    }

    #[test]
    fn missing_window_parameter_is_rejected() {
        assert!(MovingAverageStage::<f32>::new(None, None).is_err());
    }
}
