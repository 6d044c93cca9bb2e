//! External boundaries: detection sources and the description hook
//!
//! The neural detector and the language-model describer are external
//! collaborators. The pipeline only ever pulls from them with blocking
//! calls at the tick boundary; a failed or empty result is never an
//! error for the loop.

use crate::aggregator::WindowSummary;
use crate::types::RawDetection;
use std::collections::VecDeque;

/// Pull-style boundary to whatever produces per-frame detections
///
/// Returning an empty vec is a valid, non-error result. Errors are
/// stringly typed at this seam; the pipeline downgrades them to an
/// empty frame.
pub trait DetectionSource: Send {
    /// Produce this frame's detections; may block on inference
    fn next_frame(&mut self) -> Result<Vec<RawDetection>, String>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Replays a prepared per-frame script, then returns empty frames
///
/// Stands in for the camera/detector adapter in tests and demos.
pub struct ScriptedSource {
    frames: VecDeque<Vec<RawDetection>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Vec<RawDetection>, String> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Turns a window summary into a short free-text description
///
/// Models the original's language-model reply to each emotion summary.
/// The text is open vocabulary and is passed through opaquely; it is
/// never categorized or aggregated.
pub trait Describer: Send {
    fn describe(&mut self, summary: &WindowSummary) -> Option<String>;
}

/// Describer that never says anything
pub struct NullDescriber;

impl Describer for NullDescriber {
    fn describe(&mut self, _summary: &WindowSummary) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_replays_then_empties() {
        let mut source = ScriptedSource::new(vec![
            vec![RawDetection::new(0.5, 0.5, 0.2, 0.2, 0, 0.9)],
            vec![],
        ]);
        assert_eq!(source.next_frame().unwrap().len(), 1);
        assert!(source.next_frame().unwrap().is_empty());
        assert!(source.is_exhausted());
        // Exhausted script keeps yielding valid empty frames.
        assert!(source.next_frame().unwrap().is_empty());
    }
}
