//! IoU-based multi-object tracking with a stability gate
//!
//! This crate turns per-frame bounding-box detections into persistent
//! tracks. Association is frame-to-frame spatial overlap (IoU) with
//! bipartite exclusivity; track birth/death and the Provisional→Stable
//! lifecycle are managed by [`IouTracker`].
//!
//! ```rust,ignore
//! use stabletrack::{Bbox, IouTracker, Observation, TrackerConfig};
//!
//! let mut tracker = IouTracker::new(TrackerConfig::default());
//! let obs = vec![Observation::new(Bbox::from_center(0.5, 0.5, 0.2, 0.2), 0, 0.9)];
//! let live = tracker.update(&obs)?;
//! ```

pub mod assignment;
pub mod bbox;
pub mod track;
pub mod tracker;

pub use assignment::{AssignmentMethod, AssignmentResult};
pub use bbox::{calculate_iou, ious, Bbox};
pub use track::{Track, TrackState};
pub use tracker::{IouTracker, Observation, TrackerConfig};
