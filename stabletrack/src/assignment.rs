//! Detection-to-track assignment solvers
//!
//! Both solvers consume an IoU matrix and produce an exclusive
//! bipartite assignment: each detection matches at most one track and
//! vice versa. The greedy solver is the default; the Hungarian solver
//! produces an optimal matching for dense overlapping clusters.

use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres, Matrix};

/// Which solver to use for detection-to-track association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentMethod {
    /// Greedy-by-descending-IoU, ties broken by ascending track column
    #[default]
    Greedy,
    /// Optimal assignment via the Hungarian algorithm
    Hungarian,
}

/// Result of an assignment pass
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Assignments as (detection_idx, track_idx) pairs
    pub assignments: Vec<(usize, usize)>,
    /// Indices of unassigned detections
    pub unassigned_detections: Vec<usize>,
    /// Indices of unassigned tracks
    pub unassigned_tracks: Vec<usize>,
}

/// Solve the assignment problem on an IoU matrix
///
/// Entries below `iou_threshold` are never assigned. Rows are
/// detections, columns are tracks in ascending track-ID order, which
/// makes the greedy tie-break deterministic across runs.
pub fn solve_iou(
    iou_matrix: ArrayView2<f32>,
    iou_threshold: f32,
    method: AssignmentMethod,
) -> AssignmentResult {
    let num_detections = iou_matrix.nrows();
    let num_tracks = iou_matrix.ncols();

    if num_detections == 0 || num_tracks == 0 {
        return AssignmentResult {
            assignments: Vec::new(),
            unassigned_detections: (0..num_detections).collect(),
            unassigned_tracks: (0..num_tracks).collect(),
        };
    }

    match method {
        AssignmentMethod::Greedy => solve_greedy(iou_matrix, iou_threshold),
        AssignmentMethod::Hungarian => solve_hungarian(iou_matrix, iou_threshold),
    }
}

/// Greedy assignment: best-overlap pairs first
fn solve_greedy(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
    let num_detections = iou_matrix.nrows();
    let num_tracks = iou_matrix.ncols();

    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for i in 0..num_detections {
        for j in 0..num_tracks {
            let iou = iou_matrix[[i, j]];
            if iou >= iou_threshold {
                candidates.push((iou, i, j));
            }
        }
    }

    // Descending IoU; equal IoU falls back to ascending track column
    // (ascending track ID), then ascending detection index.
    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.2.cmp(&b.2))
            .then(a.1.cmp(&b.1))
    });

    let mut assignments = Vec::new();
    let mut used_detections = vec![false; num_detections];
    let mut used_tracks = vec![false; num_tracks];

    for (_iou, det_idx, track_idx) in candidates {
        if !used_detections[det_idx] && !used_tracks[track_idx] {
            assignments.push((det_idx, track_idx));
            used_detections[det_idx] = true;
            used_tracks[track_idx] = true;
        }
    }

    let unassigned_detections: Vec<usize> = (0..num_detections)
        .filter(|&i| !used_detections[i])
        .collect();
    let unassigned_tracks: Vec<usize> = (0..num_tracks).filter(|&i| !used_tracks[i]).collect();

    AssignmentResult {
        assignments,
        unassigned_detections,
        unassigned_tracks,
    }
}

/// Optimal assignment via kuhn_munkres on a scaled integer weight matrix
fn solve_hungarian(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
    let num_detections = iou_matrix.nrows();
    let num_tracks = iou_matrix.ncols();

    // kuhn_munkres maximizes total weight; scale IoU to integers and
    // zero out entries below the floor so they are never preferred.
    let threshold_int = (iou_threshold * 1000.0) as i32;
    let size = num_detections.max(num_tracks);
    let mut weights = Matrix::new(size, size, 0i32);

    for i in 0..num_detections {
        for j in 0..num_tracks {
            let w = (iou_matrix[[i, j]] * 1000.0) as i32;
            if w >= threshold_int {
                weights[(i, j)] = w;
            }
        }
    }

    let (_total, raw_assignments) = kuhn_munkres(&weights);

    let assignments: Vec<(usize, usize)> = raw_assignments
        .iter()
        .enumerate()
        .filter(|&(det_idx, &track_idx)| {
            det_idx < num_detections
                && track_idx < num_tracks
                && weights[(det_idx, track_idx)] >= threshold_int.max(1)
        })
        .map(|(det_idx, &track_idx)| (det_idx, track_idx))
        .collect();

    let mut used_detections = vec![false; num_detections];
    let mut used_tracks = vec![false; num_tracks];
    for &(d, t) in &assignments {
        used_detections[d] = true;
        used_tracks[t] = true;
    }

    let unassigned_detections: Vec<usize> = (0..num_detections)
        .filter(|&i| !used_detections[i])
        .collect();
    let unassigned_tracks: Vec<usize> = (0..num_tracks).filter(|&i| !used_tracks[i]).collect();

    AssignmentResult {
        assignments,
        unassigned_detections,
        unassigned_tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_empty_matrix() {
        let m = ndarray::Array2::<f32>::zeros((0, 3));
        let result = solve_iou(m.view(), 0.3, AssignmentMethod::Greedy);
        assert!(result.assignments.is_empty());
        assert_eq!(result.unassigned_tracks, vec![0, 1, 2]);
    }

    #[test]
    fn test_greedy_exclusivity() {
        // Two detections both overlapping track 0; only one may win.
        let m = array![[0.9_f32, 0.0], [0.8, 0.0]];
        let result = solve_iou(m.view(), 0.3, AssignmentMethod::Greedy);
        assert_eq!(result.assignments, vec![(0, 0)]);
        assert_eq!(result.unassigned_detections, vec![1]);
        assert_eq!(result.unassigned_tracks, vec![1]);
    }

    #[test]
    fn test_greedy_tie_break_by_track_column() {
        // Identical IoU against both tracks: the lower column (lower
        // track ID) must win, on every run.
        let m = array![[0.5_f32, 0.5]];
        for _ in 0..10 {
            let result = solve_iou(m.view(), 0.3, AssignmentMethod::Greedy);
            assert_eq!(result.assignments, vec![(0, 0)]);
        }
    }

    #[test]
    fn test_greedy_threshold_floor() {
        let m = array![[0.2_f32]];
        let result = solve_iou(m.view(), 0.3, AssignmentMethod::Greedy);
        assert!(result.assignments.is_empty());
        assert_eq!(result.unassigned_detections, vec![0]);
        assert_eq!(result.unassigned_tracks, vec![0]);
    }

    #[test]
    fn test_hungarian_beats_greedy_on_conflict() {
        // Greedy takes (0,0) at 0.6 and strands detection 1; the
        // optimal matching pairs (0,1) and (1,0).
        let m = array![[0.6_f32, 0.5], [0.55, 0.0]];
        let greedy = solve_iou(m.view(), 0.3, AssignmentMethod::Greedy);
        assert_eq!(greedy.assignments, vec![(0, 0)]);

        let mut optimal = solve_iou(m.view(), 0.3, AssignmentMethod::Hungarian).assignments;
        optimal.sort();
        assert_eq!(optimal, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_hungarian_respects_threshold() {
        let m = array![[0.9_f32, 0.1], [0.1, 0.1]];
        let result = solve_iou(m.view(), 0.3, AssignmentMethod::Hungarian);
        assert_eq!(result.assignments, vec![(0, 0)]);
        assert_eq!(result.unassigned_detections, vec![1]);
        assert_eq!(result.unassigned_tracks, vec![1]);
    }
}
