//! Progress reporting for long-running scans.
//!
//! The scanner reports through a caller-supplied [`Progress`] sink. Internally
//! each phase works against a [`Job`], a slice of the overall 0-100 budget that
//! can be split into weighted sub-jobs, mirroring how the scan phases nest
//! (size reads inside matching inside the whole scan).

use crate::error::{Error, Result};

/// Caller-supplied progress sink.
///
/// `update` may be invoked from worker threads while the matcher is fanned
/// out, so implementations must be cheap and must not assume a single caller
/// thread. They must not call back into the scanner.
pub trait Progress: Sync {
    fn update(&self, percent: u32, message: &str);

    /// Polled between phases and inside the matcher loops. Returning true
    /// makes the scan stop with [`Error::Aborted`].
    fn is_aborted(&self) -> bool {
        false
    }
}

/// Sink that swallows everything. Useful for tests and batch callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn update(&self, _percent: u32, _message: &str) {}
}

/// A slice of the global progress budget.
///
/// A job maps its local 0-100 range onto `[base, base + span]` of the overall
/// scan. Splitting hands out sub-jobs proportional to the given weights, so a
/// phase never needs to know where in the scan it runs.
#[derive(Clone, Copy)]
pub struct Job<'a> {
    sink: &'a dyn Progress,
    base: f32,
    span: f32,
}

impl<'a> Job<'a> {
    pub fn new(sink: &'a dyn Progress) -> Self {
        Self {
            sink,
            base: 0.0,
            span: 100.0,
        }
    }

    /// Split this job into `N` sub-jobs with the given relative weights.
    pub fn split<const N: usize>(&self, weights: [u32; N]) -> [Job<'a>; N] {
        let total = weights.iter().sum::<u32>().max(1) as f32;
        let mut consumed = 0u32;
        weights.map(|weight| {
            let base = self.base + self.span * (consumed as f32 / total);
            consumed += weight;
            Job {
                sink: self.sink,
                base,
                span: self.span * (weight as f32 / total),
            }
        })
    }

    /// Report local progress (0-100 within this job's slice).
    pub fn set_progress(&self, percent: u32, message: &str) {
        let local = percent.min(100) as f32;
        let global = (self.base + self.span * local / 100.0).round() as u32;
        self.sink.update(global.min(100), message);
    }

    pub fn is_aborted(&self) -> bool {
        self.sink.is_aborted()
    }

    pub fn check_aborted(&self) -> Result<()> {
        if self.sink.is_aborted() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }
}
