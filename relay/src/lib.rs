//! Scene Relay
//!
//! Converts a continuous stream of noisy per-frame object detections
//! (faces with emotion scores, glyph boxes) into temporally stable,
//! identity-persistent tracks, compresses per-frame classifications
//! into windowed group summaries, and publishes both as discrete OSC
//! events to a downstream visualization engine.
//!
//! Frame acquisition and the neural models themselves live behind the
//! [`source::DetectionSource`] boundary; this crate owns everything
//! between a frame's raw detections and the outbound datagram.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod source;
pub mod types;

pub use aggregator::{WindowAggregator, WindowSummary};
pub use config::{RelayConfig, WindowTrigger};
pub use error::{RelayError, Result};
pub use pipeline::ScenePipeline;
pub use publisher::{MemorySink, OscPublisher, OscSink, TrackReport, UdpSink};
pub use source::{Describer, DetectionSource, NullDescriber, ScriptedSource};
pub use types::{sanitize_detections, Category, Emotion, MalformedLog, RawDetection};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
