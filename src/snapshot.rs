//! The serialisable state document a pipeline can be saved to and restored
//! from.
//!
//! Field names follow the canonical wire schema exactly (`schemaVersion`,
//! `capturedAt`, `stages`, `index`, `name`, `params`, `state`, `numChannels`,
//! `channels`, `buffer`, `aggregates`) via `#[serde(rename = "...")]` where
//! Rust naming conventions diverge from the camelCase wire format. Widening
//! timestamps to `f64` (see [`crate::numeric`]) is a compatibility break
//! against documents that encoded timestamps at single precision, so this
//! schema is versioned `"2"`.

use crate::reducer::ReducerAggregate;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "2";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotDocument<T> {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "capturedAt")]
    pub captured_at: u64,
    pub channels: u32,
    pub stages: Vec<StageSnapshot<T>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageSnapshot<T> {
    pub index: u32,
    pub name: String,
    pub params: StageParams<T>,
    pub state: StageState<T>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageState<T> {
    #[serde(rename = "numChannels")]
    pub num_channels: u32,
    pub channels: Vec<ChannelSnapshot<T>>,
}

/// Per-channel state. Not every field applies to every stage kind: window
/// stages populate `buffer`/`timestamps`/`aggregates`; FIR populates
/// `buffer`/`position`; IIR populates `buffer`/`output_history`; the
/// streaming-FFT stage populates `buffer`/`ready_pushes`. Unused fields are
/// omitted from the serialised form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelSnapshot<T> {
    pub buffer: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<ReducerAggregate>,
    #[serde(rename = "outputHistory", skip_serializing_if = "Option::is_none")]
    pub output_history: Option<Vec<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(rename = "readyPushes", skip_serializing_if = "Option::is_none")]
    pub ready_pushes: Option<u64>,
}

/// Stage construction parameters, named to match the wire schema's sketch
/// (`windowSize?`, `windowDuration?`, `mode?`, `epsilon?`, `coefficients?`,
/// `fftSize?`, `hopSize?`, `windowType?`, `...`). Two fields beyond that
/// sketch are needed in practice: `feedbackCoefficients` (the IIR `a`
/// vector — `coefficients` alone is ambiguous between FIR taps and IIR
/// feedforward) and `realInput` (the streaming-FFT real/complex flag).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StageParams<T> {
    #[serde(rename = "windowSize", skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    #[serde(rename = "windowDuration", skip_serializing_if = "Option::is_none")]
    pub window_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<Vec<T>>,
    #[serde(
        rename = "feedbackCoefficients",
        skip_serializing_if = "Option::is_none"
    )]
    pub feedback_coefficients: Option<Vec<T>>,
    #[serde(rename = "fftSize", skip_serializing_if = "Option::is_none")]
    pub fft_size: Option<usize>,
    #[serde(rename = "hopSize", skip_serializing_if = "Option::is_none")]
    pub hop_size: Option<usize>,
    #[serde(rename = "windowType", skip_serializing_if = "Option::is_none")]
    pub window_type: Option<String>,
    #[serde(rename = "realInput", skip_serializing_if = "Option::is_none")]
    pub real_input: Option<bool>,
}

/// A compact structural view with channel buffer/aggregate contents
/// stripped out, for logging and UI (`Pipeline::list_state`). Typically well
/// under half the size of the full snapshot since buffers dominate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateSummary<T> {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "capturedAt")]
    pub captured_at: u64,
    pub channels: u32,
    pub stages: Vec<StageSummary<T>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageSummary<T> {
    pub index: u32,
    pub name: String,
    pub params: StageParams<T>,
    #[serde(rename = "numChannels")]
    pub num_channels: u32,
}

impl<T: Clone> SnapshotDocument<T> {
    pub fn summarize(&self) -> StateSummary<T> {
        StateSummary {
            schema_version: self.schema_version.clone(),
            captured_at: self.captured_at,
            channels: self.channels,
            stages: self
                .stages
                .iter()
                .map(|s| StageSummary {
                    index: s.index,
                    name: s.name.clone(),
                    params: s.params.clone(),
                    num_channels: s.state.num_channels,
                })
                .collect(),
        }
    }
}
