//! Multi-object tracker: frame-to-frame association, birth and death

use crate::assignment::{solve_iou, AssignmentMethod};
use crate::bbox::{ious, Bbox};
use crate::track::{Track, TrackState};
use anyhow::ensure;
use std::collections::BTreeMap;

/// One detection handed to the tracker for a single frame
#[derive(Debug, Clone)]
pub struct Observation {
    pub bbox: Bbox<f32>,
    pub class_id: u32,
    pub score: f32,
}

impl Observation {
    pub fn new(bbox: Bbox<f32>, class_id: u32, score: f32) -> Self {
        Self {
            bbox,
            class_id,
            score,
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Minimum IoU for associating a detection to a track
    pub iou_threshold: f32,
    /// Consecutive matches before a track is reported as stable
    pub min_hits: u32,
    /// Consecutive misses beyond which a track is removed
    pub max_misses: u32,
    /// Assignment solver
    pub assignment: AssignmentMethod,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            min_hits: 3,
            max_misses: 20,
            assignment: AssignmentMethod::Greedy,
        }
    }
}

/// IoU-based multi-object tracker with an integrated stability gate
///
/// Tracks are stored in a `BTreeMap` so that iteration order is
/// ascending track ID, which keeps the greedy assignment tie-break
/// deterministic.
#[derive(Debug, Clone)]
pub struct IouTracker {
    config: TrackerConfig,
    next_track_id: u32,
    tracks: BTreeMap<u32, Track>,
    n_steps: u64,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        IouTracker {
            config,
            next_track_id: 1,
            tracks: BTreeMap::new(),
            n_steps: 0,
        }
    }

    /// Update the tracker with one frame's detections
    ///
    /// Matched tracks take the detection's box and reset their miss
    /// count; unmatched detections become new tracks; unmatched tracks
    /// age and are removed once `misses > max_misses`. Returns a
    /// snapshot of every live track after the update.
    pub fn update(&mut self, observations: &[Observation]) -> anyhow::Result<Vec<Track>> {
        for obs in observations {
            ensure!(
                obs.bbox.is_finite() && obs.score.is_finite(),
                "non-finite observation handed to tracker: {}",
                obs.bbox
            );
        }

        let track_ids: Vec<u32> = self.tracks.keys().copied().collect();
        let track_boxes: Vec<Bbox<f32>> = self.tracks.values().map(|t| t.bbox).collect();
        let track_classes: Vec<u32> = self.tracks.values().map(|t| t.class_id).collect();
        let det_boxes: Vec<Bbox<f32>> = observations.iter().map(|o| o.bbox).collect();

        // Same-class association only: zero out cross-class overlap so
        // the solvers never pair a face box with a glyph track.
        let mut iou_matrix = ious(&det_boxes, &track_boxes);
        for (i, obs) in observations.iter().enumerate() {
            for (j, class_id) in track_classes.iter().enumerate() {
                if obs.class_id != *class_id {
                    iou_matrix[[i, j]] = 0.0;
                }
            }
        }

        let result = solve_iou(
            iou_matrix.view(),
            self.config.iou_threshold,
            self.config.assignment,
        );

        for (det_idx, track_idx) in result.assignments {
            let track_id = track_ids[track_idx];
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.apply_match(&observations[det_idx], det_idx, self.config.min_hits);
            }
        }

        for track_idx in result.unassigned_tracks {
            let track_id = track_ids[track_idx];
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.apply_miss();
            }
        }

        let max_misses = self.config.max_misses;
        self.tracks.retain(|_, track| track.misses <= max_misses);

        for det_idx in result.unassigned_detections {
            let id = self.next_track_id;
            self.next_track_id += 1;
            self.tracks.insert(
                id,
                Track::new(id, &observations[det_idx], det_idx, self.config.min_hits),
            );
        }

        self.n_steps += 1;
        Ok(self.tracks.values().cloned().collect())
    }

    /// All live tracks, ascending ID order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// The stability-gate surface: only tracks that have persisted
    /// long enough to be reportable downstream
    pub fn stable_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks
            .values()
            .filter(|t| t.state == TrackState::Stable)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn step_count(&self) -> u64 {
        self.n_steps
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_at(cx: f32, cy: f32) -> Observation {
        Observation::new(Bbox::from_center(cx, cy, 0.2, 0.2), 0, 0.9)
    }

    fn config(min_hits: u32, max_misses: u32) -> TrackerConfig {
        TrackerConfig {
            iou_threshold: 0.3,
            min_hits,
            max_misses,
            assignment: AssignmentMethod::Greedy,
        }
    }

    #[test]
    fn test_empty_frames_create_nothing() {
        let mut tracker = IouTracker::new(config(3, 2));
        for _ in 0..10 {
            let live = tracker.update(&[]).unwrap();
            assert!(live.is_empty());
        }
        assert_eq!(tracker.step_count(), 10);
    }

    #[test]
    fn test_birth_and_identity_persistence() {
        let mut tracker = IouTracker::new(config(1, 2));
        let live = tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, 1);

        // Slightly moved box keeps the same identity.
        let live = tracker.update(&[obs_at(0.52, 0.5)]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, 1);
        assert_eq!(live[0].hits, 2);
    }

    #[test]
    fn test_stability_promotion_at_threshold() {
        let mut tracker = IouTracker::new(config(3, 2));

        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        assert_eq!(tracker.stable_tracks().count(), 0);
        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        assert_eq!(tracker.stable_tracks().count(), 0);
        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        assert_eq!(tracker.stable_tracks().count(), 1);
    }

    #[test]
    fn test_miss_then_removal_without_id_reuse() {
        let mut tracker = IouTracker::new(config(1, 2));
        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();

        // Three consecutive misses: misses 3 > max_misses 2, removed.
        tracker.update(&[]).unwrap();
        tracker.update(&[]).unwrap();
        assert_eq!(tracker.len(), 1);
        let live = tracker.update(&[]).unwrap();
        assert!(live.is_empty());

        // A new detection must not recycle ID 1.
        let live = tracker.update(&[obs_at(0.5, 0.5)]).unwrap();
        assert_eq!(live[0].id, 2);
    }

    #[test]
    fn test_overlapping_detections_never_share_a_track() {
        let mut tracker = IouTracker::new(config(1, 2));
        tracker.update(&[obs_at(0.5, 0.5)]).unwrap();

        // Two near-identical detections: one matches, one births.
        let live = tracker
            .update(&[obs_at(0.5, 0.5), obs_at(0.51, 0.5)])
            .unwrap();
        assert_eq!(live.len(), 2);
        let matched: Vec<_> = live.iter().filter(|t| t.det_idx.is_some()).collect();
        assert_eq!(matched.len(), 2);
        assert_ne!(matched[0].det_idx, matched[1].det_idx);
    }

    #[test]
    fn test_class_mismatch_never_associates() {
        let mut tracker = IouTracker::new(config(1, 5));
        tracker
            .update(&[Observation::new(Bbox::from_center(0.5, 0.5, 0.2, 0.2), 0, 0.9)])
            .unwrap();

        // Same box, different class: existing track misses, new track born.
        let live = tracker
            .update(&[Observation::new(Bbox::from_center(0.5, 0.5, 0.2, 0.2), 1, 0.9)])
            .unwrap();
        assert_eq!(live.len(), 2);
        let old = live.iter().find(|t| t.id == 1).unwrap();
        assert_eq!(old.misses, 1);
    }

    #[test]
    fn test_rejects_non_finite_observation() {
        let mut tracker = IouTracker::new(config(1, 2));
        let bad = Observation::new(Bbox::new(f32::NAN, 0.0, 0.1, 0.1), 0, 0.9);
        assert!(tracker.update(&[bad]).is_err());
        // Failed validation must not mutate tracker state.
        assert!(tracker.is_empty());
        assert_eq!(tracker.step_count(), 0);
    }
}
