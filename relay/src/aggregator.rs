//! Temporal aggregation of per-frame classification samples
//!
//! High-frequency per-track emotion observations are compressed into
//! low-frequency window summaries: per-category counts plus a single
//! dominant category with a deterministic tie-break.

use crate::config::WindowTrigger;
use crate::types::Category;
use std::time::{Duration, Instant};

/// The reduction of one closed window
///
/// `counts` is indexed by [`Category`] declared order and always
/// carries every category, zero or not. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub counts: [u32; Category::COUNT],
    pub dominant: Category,
    pub samples: u32,
}

impl WindowSummary {
    pub fn count(&self, category: Category) -> u32 {
        self.counts[category.index()]
    }
}

/// Accumulates classification samples until the window trigger fires
#[derive(Debug)]
pub struct WindowAggregator {
    trigger: WindowTrigger,
    default_category: Category,
    counts: [u32; Category::COUNT],
    samples: u32,
    window_started_at: Instant,
}

impl WindowAggregator {
    pub fn new(trigger: WindowTrigger, default_category: Category, now: Instant) -> Self {
        Self {
            trigger,
            default_category,
            counts: [0; Category::COUNT],
            samples: 0,
            window_started_at: now,
        }
    }

    /// Tally one classified detection into the current window
    pub fn absorb(&mut self, category: Category) {
        self.counts[category.index()] += 1;
        self.samples += 1;
    }

    pub fn samples_in_window(&self) -> u32 {
        self.samples
    }

    /// Close the window if its trigger has fired
    ///
    /// The next window's timer restarts from the close instant, not
    /// the originally scheduled boundary, so a late tick slips the
    /// schedule instead of collapsing the next window.
    pub fn maybe_close(&mut self, now: Instant) -> Option<WindowSummary> {
        let ready = match self.trigger {
            WindowTrigger::Samples(n) => self.samples >= n,
            WindowTrigger::Seconds(secs) => {
                now.duration_since(self.window_started_at) >= Duration::from_secs_f64(secs)
            }
        };
        if !ready {
            return None;
        }

        let summary = WindowSummary {
            counts: self.counts,
            dominant: self.dominant(),
            samples: self.samples,
        };

        self.counts = [0; Category::COUNT];
        self.samples = 0;
        self.window_started_at = now;

        log::debug!(
            "window closed: dominant={} counts={:?}",
            summary.dominant.name(),
            summary.counts
        );
        Some(summary)
    }

    /// Argmax over counts; ties resolve by category declared order,
    /// never by arrival order. An empty window yields the configured
    /// default category.
    fn dominant(&self) -> Category {
        if self.samples == 0 {
            return self.default_category;
        }
        let mut best = Category::ALL[0];
        for category in Category::ALL {
            if self.counts[category.index()] > self.counts[best.index()] {
                best = category;
            }
        }
        best
    }
}
