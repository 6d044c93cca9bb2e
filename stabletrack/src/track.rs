//! Per-track state and lifecycle

use crate::bbox::Bbox;
use crate::tracker::Observation;

/// Lifecycle state of a track
///
/// A track is born `Provisional` and promotes to `Stable` once it has
/// been matched for enough consecutive frames. A single miss resets
/// the streak and demotes the track, suppressing detector flicker from
/// leaking downstream. Removal on death is handled by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Provisional,
    Stable,
}

/// A persistent identity for one physical object across frames
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique ID, monotonically assigned, never reused within a run
    pub id: u32,
    /// Current bounding box, replaced wholesale on every match
    pub bbox: Bbox<f32>,
    pub class_id: u32,
    /// Confidence of the most recent matched detection
    pub score: f32,
    /// Total matched frames over the track's lifetime
    pub hits: u32,
    /// Consecutive matched frames; zeroed by any miss
    pub hit_streak: u32,
    /// Consecutive unmatched frames; zeroed by any match
    pub misses: u32,
    pub state: TrackState,
    /// Index of this frame's matched detection, if any
    pub det_idx: Option<usize>,
}

impl Track {
    /// Create a new track from its first observation
    pub fn new(id: u32, obs: &Observation, det_idx: usize, min_hits: u32) -> Self {
        let state = if min_hits <= 1 {
            TrackState::Stable
        } else {
            TrackState::Provisional
        };
        Track {
            id,
            bbox: obs.bbox,
            class_id: obs.class_id,
            score: obs.score,
            hits: 1,
            hit_streak: 1,
            misses: 0,
            state,
            det_idx: Some(det_idx),
        }
    }

    /// Absorb a matched detection for this frame
    pub fn apply_match(&mut self, obs: &Observation, det_idx: usize, min_hits: u32) {
        self.bbox = obs.bbox;
        self.score = obs.score;
        self.hits += 1;
        self.hit_streak += 1;
        self.misses = 0;
        self.det_idx = Some(det_idx);
        if self.hit_streak >= min_hits {
            self.state = TrackState::Stable;
        }
    }

    /// Record an unmatched frame
    pub fn apply_miss(&mut self) {
        self.misses += 1;
        self.hit_streak = 0;
        self.det_idx = None;
        self.state = TrackState::Provisional;
    }

    pub fn is_stable(&self) -> bool {
        self.state == TrackState::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs() -> Observation {
        Observation::new(Bbox::from_center(0.5, 0.5, 0.2, 0.2), 0, 0.9)
    }

    #[test]
    fn test_promotion_at_min_hits() {
        let mut track = Track::new(1, &obs(), 0, 3);
        assert_eq!(track.state, TrackState::Provisional);

        track.apply_match(&obs(), 0, 3);
        assert_eq!(track.state, TrackState::Provisional);

        track.apply_match(&obs(), 0, 3);
        assert_eq!(track.state, TrackState::Stable);
        assert_eq!(track.hit_streak, 3);
    }

    #[test]
    fn test_min_hits_one_is_stable_at_birth() {
        let track = Track::new(1, &obs(), 0, 1);
        assert!(track.is_stable());
    }

    #[test]
    fn test_miss_demotes_and_resets_streak() {
        let mut track = Track::new(1, &obs(), 0, 2);
        track.apply_match(&obs(), 0, 2);
        assert!(track.is_stable());

        track.apply_miss();
        assert_eq!(track.state, TrackState::Provisional);
        assert_eq!(track.hit_streak, 0);
        assert_eq!(track.misses, 1);
        assert_eq!(track.det_idx, None);

        // Re-promotion needs the full streak again.
        track.apply_match(&obs(), 0, 2);
        assert!(!track.is_stable());
        track.apply_match(&obs(), 0, 2);
        assert!(track.is_stable());
    }
}
