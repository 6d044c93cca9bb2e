//! The per-source tick loop
//!
//! One `ScenePipeline` owns the tracker, aggregator and publisher for
//! exactly one detection source. Running several sources means running
//! several pipelines; nothing but the outbound sink is ever shared.

use crate::aggregator::WindowAggregator;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::publisher::{OscPublisher, OscSink, TrackReport};
use crate::source::{Describer, DetectionSource, NullDescriber};
use crate::types::{sanitize_detections, MalformedLog, RawDetection};
use stabletrack::{IouTracker, Observation};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// One tracking-and-aggregation pipeline for one detection source
pub struct ScenePipeline {
    config: RelayConfig,
    source: Box<dyn DetectionSource>,
    describer: Box<dyn Describer>,
    tracker: IouTracker,
    aggregator: WindowAggregator,
    publisher: OscPublisher,
    malformed: MalformedLog,
    tick_count: u64,
}

impl ScenePipeline {
    /// Build a pipeline; configuration errors are fatal here and only here
    pub fn new(
        config: RelayConfig,
        source: Box<dyn DetectionSource>,
        sink: Box<dyn OscSink>,
    ) -> Result<Self> {
        Self::with_describer(config, source, sink, Box::new(NullDescriber))
    }

    pub fn with_describer(
        config: RelayConfig,
        source: Box<dyn DetectionSource>,
        sink: Box<dyn OscSink>,
        describer: Box<dyn Describer>,
    ) -> Result<Self> {
        config.validate()?;

        let now = Instant::now();
        let tracker = IouTracker::new(config.tracker_config());
        let aggregator =
            WindowAggregator::new(config.window_trigger(), config.default_category, now);
        let mut publisher = OscPublisher::new(sink, &config);

        // Announce timing assumptions once at startup so the consumer
        // can self-adjust.
        publisher.publish_config("agent_interval", config.agent_interval_secs(), now);

        log::info!(
            "pipeline ready: source={} fps={} min_hits={} max_misses={} window={:?}",
            source.name(),
            config.fps,
            config.min_hits,
            config.max_misses,
            config.window_trigger(),
        );

        Ok(Self {
            config,
            source,
            describer,
            tracker,
            aggregator,
            publisher,
            malformed: MalformedLog::default(),
            tick_count: 0,
        })
    }

    /// Run one tick: pull detections, associate, gate, aggregate, publish
    ///
    /// Never fails: a broken source or transport degrades to fewer
    /// events downstream, not to a halted loop.
    pub fn tick(&mut self, now: Instant) {
        let raw = match self.source.next_frame() {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!(
                    "source {} failed ({e}); treating as zero detections",
                    self.source.name()
                );
                Vec::new()
            }
        };

        let detections = sanitize_detections(raw, self.config.class_count, &mut self.malformed);
        let observations: Vec<Observation> = detections
            .iter()
            .map(|d| Observation::new(d.bbox(), d.class_id, d.confidence))
            .collect();

        if let Err(e) = self.tracker.update(&observations) {
            // Sanitization should make this unreachable; skip the tick
            // rather than feed the gate a half-updated state.
            log::error!("tracker rejected frame: {e}");
            return;
        }

        let reports = self.stable_reports(&detections);

        if reports.is_empty() {
            self.publisher.publish_no_face(now);
        } else {
            self.publisher.publish_tracks(&reports, now);
        }

        // Classification samples come from every classified detection,
        // not just stable tracks; stability gates identity reporting,
        // while the mood of the room counts everyone in frame.
        if self.tick_count % self.config.sample_every_ticks as u64 == 0 {
            for detection in &detections {
                if let Some(emotion) = detection.dominant_emotion() {
                    self.aggregator.absorb(emotion.category());
                }
            }
        }

        if let Some(summary) = self.aggregator.maybe_close(now) {
            self.publisher.publish_summary(&summary, now);
            if let Some(word) = self.describer.describe(&summary) {
                self.publisher.publish_word(&word, now);
            }
        }

        let live: std::collections::HashSet<u32> = self.tracker.tracks().map(|t| t.id).collect();
        self.publisher.retain_tracks(|id| live.contains(&id));

        self.tick_count += 1;
    }

    /// Stable tracks paired with their matched detection's emotion
    fn stable_reports(&self, detections: &[RawDetection]) -> Vec<TrackReport> {
        self.tracker
            .stable_tracks()
            .filter_map(|track| {
                let det = track.det_idx.and_then(|i| detections.get(i))?;
                let [cx, cy, w, h] = track.bbox.to_center();
                let emotion_index = det
                    .dominant_emotion()
                    .map(|e| e.index() as i32)
                    .unwrap_or(-1);
                Some(TrackReport {
                    id: track.id,
                    cx,
                    cy,
                    w,
                    h,
                    emotion_index,
                })
            })
            .collect()
    }

    /// Drive the tick loop until `stop` is raised
    ///
    /// The stop flag is checked once per tick boundary; a tick never
    /// rolls back partially, so no cleanup is needed on exit.
    pub fn run(&mut self, stop: &AtomicBool) {
        let period = self.config.tick_period();
        log::info!("tick loop started, period {:?}", period);

        while !stop.load(Ordering::Relaxed) {
            let tick_start = Instant::now();
            self.tick(tick_start);

            let elapsed = tick_start.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        log::info!("tick loop stopped after {} ticks", self.tick_count);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Live track count, for operator diagnostics
    pub fn live_tracks(&self) -> usize {
        self.tracker.len()
    }

    /// Stable track count
    pub fn stable_tracks(&self) -> usize {
        self.tracker.stable_tracks().count()
    }
}
