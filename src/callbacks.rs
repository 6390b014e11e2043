//! Observability callbacks invoked by the pipeline between stages.
//!
//! Callbacks are synchronous, fire-and-forget, and never called from inside
//! a stage's hot loop — only after a stage has finished a whole `process`
//! call. A callback that panics is caught and routed to `onError` instead of
//! unwinding through the pipeline, so a misbehaving callback cannot bring
//! down processing.

use crate::error::DspError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Fired once per stage, after that stage has finished transforming the
/// buffer, with the wall-clock duration of that stage's call.
pub type StageCompleteCallback = Box<dyn FnMut(&str, f64) + Send>;

/// Fired once per stage with the (possibly large) transformed slice and the
/// frame index that buffer starts at. Registering this callback has a cost:
/// callers that do not need per-batch inspection should leave it unset.
pub type BatchCallback = Box<dyn FnMut(&str, &[f32], usize) + Send>;

/// Fired whenever a stage or a prior callback produces an error.
pub type ErrorCallback = Box<dyn FnMut(&str, &DspError) + Send>;

/// The callback set a pipeline may be configured with. All three are
/// optional; an unset callback is simply never invoked.
#[derive(Default)]
pub struct Callbacks {
    pub on_stage_complete: Option<StageCompleteCallback>,
    pub on_batch: Option<BatchCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fire_stage_complete(&mut self, stage: &str, duration_ms: f64) {
        if let Some(cb) = self.on_stage_complete.as_mut() {
            let err = catch_unwind(AssertUnwindSafe(|| cb(stage, duration_ms))).err();
            drop(err); // a panicking onStageComplete has no error value to report; it is simply suppressed.
        }
    }

    pub(crate) fn fire_batch(&mut self, stage: &str, samples: &[f32], start_frame: usize) {
        if let Some(cb) = self.on_batch.as_mut() {
            let _ = catch_unwind(AssertUnwindSafe(|| cb(stage, samples, start_frame)));
        }
    }

    pub(crate) fn fire_error(&mut self, stage: &str, error: &DspError) {
        if let Some(cb) = self.on_error.as_mut() {
            let _ = catch_unwind(AssertUnwindSafe(|| cb(stage, error)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_callbacks_are_no_ops() {
        let mut cbs = Callbacks::new();
        cbs.fire_stage_complete("fir", 1.0);
        cbs.fire_batch("fir", &[1.0, 2.0], 0);
        cbs.fire_error("fir", &DspError::Empty { context: "test".into() });
    }

    #[test]
    fn stage_complete_callback_runs() {
        let mut cbs = Callbacks::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        cbs.on_stage_complete = Some(Box::new(move |name, ms| {
            seen2.lock().unwrap().push((name.to_string(), ms));
        }));
        cbs.fire_stage_complete("rms", 0.5);
        assert_eq!(seen.lock().unwrap()[0], ("rms".to_string(), 0.5));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let mut cbs = Callbacks::new();
        cbs.on_stage_complete = Some(Box::new(|_, _| panic!("boom")));
        cbs.fire_stage_complete("fir", 1.0); // must not unwind out of this test
    }
}
