//! Detection, emotion and category types

use serde::Deserialize;
use stabletrack::Bbox;

/// One raw detection handed over the source boundary
///
/// Coordinates are normalized center form: center x/y and width/height
/// relative to the frame, each expected in [0, 1]. `emotion_scores`
/// holds the classifier's per-emotion probabilities when available,
/// indexed by [`Emotion`] order.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub class_id: u32,
    pub confidence: f32,
    pub emotion_scores: Option<Vec<f32>>,
}

impl RawDetection {
    pub fn new(cx: f32, cy: f32, w: f32, h: f32, class_id: u32, confidence: f32) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            class_id,
            confidence,
            emotion_scores: None,
        }
    }

    pub fn with_emotion_scores(mut self, scores: Vec<f32>) -> Self {
        self.emotion_scores = Some(scores);
        self
    }

    /// Corner-form box clamped into the unit square
    pub fn bbox(&self) -> Bbox<f32> {
        Bbox::from_center(self.cx, self.cy, self.w, self.h).clamp_unit()
    }

    /// The classifier's dominant emotion, if scores are present
    pub fn dominant_emotion(&self) -> Option<Emotion> {
        let scores = self.emotion_scores.as_ref()?;
        if scores.len() != Emotion::COUNT {
            return None;
        }
        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        Emotion::from_index(best)
    }
}

/// Raw detector emotion classes, in the classifier's output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprise,
    Fear,
    Sad,
    Angry,
    Disgust,
}

impl Emotion {
    pub const COUNT: usize = 7;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Fear,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Emotion::ALL.get(index).copied()
    }

    /// Map a raw emotion onto its aggregate category
    pub fn category(&self) -> Category {
        match self {
            Emotion::Neutral => Category::Calm,
            Emotion::Happy | Emotion::Surprise => Category::Active,
            Emotion::Fear | Emotion::Angry | Emotion::Disgust => Category::Anxious,
            Emotion::Sad => Category::Hesitant,
        }
    }
}

/// Aggregate emotion categories
///
/// The declared order is load-bearing three ways: it is the category
/// index on the wire, the count order in the aggregate summary
/// message, and the tie-break priority when window counts are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Active,
    Calm,
    Hesitant,
    Anxious,
}

impl Category {
    pub const COUNT: usize = 4;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Active,
        Category::Calm,
        Category::Hesitant,
        Category::Anxious,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Active => "active",
            Category::Calm => "calm",
            Category::Hesitant => "hesitant",
            Category::Anxious => "anxious",
        }
    }
}

/// Once-per-reason logging latch for malformed detections
///
/// Malformed input is dropped before it reaches the tracker; each drop
/// reason is logged the first time it occurs in a run, not per
/// instance, so a misbehaving detector cannot flood the logs.
#[derive(Debug, Default)]
pub struct MalformedLog {
    coords_logged: bool,
    class_logged: bool,
    scores_logged: bool,
}

fn coords_in_range(det: &RawDetection) -> bool {
    [det.cx, det.cy, det.w, det.h, det.confidence]
        .iter()
        .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
}

/// Drop malformed detections before tracking
///
/// A detection survives only if its normalized coordinates and
/// confidence are finite and in [0, 1], its class is known, and its
/// emotion score vector (when present) has the expected length.
pub fn sanitize_detections(
    detections: Vec<RawDetection>,
    class_count: u32,
    log: &mut MalformedLog,
) -> Vec<RawDetection> {
    detections
        .into_iter()
        .filter(|det| {
            if !coords_in_range(det) {
                if !log.coords_logged {
                    log::warn!(
                        "dropping detection with out-of-range coordinates \
                         (cx={}, cy={}, w={}, h={}); further drops of this kind logged at debug",
                        det.cx,
                        det.cy,
                        det.w,
                        det.h
                    );
                    log.coords_logged = true;
                } else {
                    log::debug!("dropping detection with out-of-range coordinates");
                }
                return false;
            }
            if det.class_id >= class_count {
                if !log.class_logged {
                    log::warn!(
                        "dropping detection with unknown class {} (class_count={}); \
                         further drops of this kind logged at debug",
                        det.class_id,
                        class_count
                    );
                    log.class_logged = true;
                } else {
                    log::debug!("dropping detection with unknown class {}", det.class_id);
                }
                return false;
            }
            if let Some(scores) = &det.emotion_scores {
                if scores.len() != Emotion::COUNT || scores.iter().any(|s| !s.is_finite()) {
                    if !log.scores_logged {
                        log::warn!(
                            "dropping detection with malformed emotion scores (len={}); \
                             further drops of this kind logged at debug",
                            scores.len()
                        );
                        log.scores_logged = true;
                    } else {
                        log::debug!("dropping detection with malformed emotion scores");
                    }
                    return false;
                }
            }
            true
        })
        .collect()
}
