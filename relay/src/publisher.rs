//! Outbound OSC event publishing
//!
//! Serializes track state and window summaries into discrete OSC
//! messages. Every message class is rate-limited independently, and a
//! send that the transport refuses is dropped, never queued: stale
//! visual feedback is worse than missing feedback.

use crate::aggregator::WindowSummary;
use crate::config::RelayConfig;
use crate::types::Category;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Transport seam: one call sends one complete message datagram
///
/// Implementations must tolerate concurrent senders without
/// interleaving a single datagram's bytes; UDP gives this for free.
pub trait OscSink: Send {
    fn send(&self, datagram: &[u8]) -> std::io::Result<()>;
}

/// Non-blocking UDP sink
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect to `destination`
    pub fn connect(destination: &str) -> crate::error::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        socket.connect(destination)?;
        Ok(Self { socket })
    }
}

impl OscSink for UdpSink {
    fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.socket.send(datagram).map(|_| ())
    }
}

/// Sink that captures datagrams in memory, for tests and dry runs
#[derive(Clone, Default)]
pub struct MemorySink {
    datagrams: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded packets captured so far
    pub fn packets(&self) -> Vec<OscPacket> {
        self.datagrams
            .lock()
            .expect("memory sink lock poisoned")
            .iter()
            .filter_map(|buf| rosc::decoder::decode_udp(buf).ok().map(|(_, pkt)| pkt))
            .collect()
    }

    /// Captured messages matching an OSC address
    pub fn messages_to(&self, addr: &str) -> Vec<OscMessage> {
        self.packets()
            .into_iter()
            .filter_map(|pkt| match pkt {
                OscPacket::Message(msg) if msg.addr == addr => Some(msg),
                _ => None,
            })
            .collect()
    }
}

impl OscSink for MemorySink {
    fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.datagrams
            .lock()
            .expect("memory sink lock poisoned")
            .push(datagram.to_vec());
        Ok(())
    }
}

/// Message classes with independent rate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Track,
    Presence,
    Summary,
    Word,
    Config,
}

const KIND_COUNT: usize = 5;

/// Per-track state handed to the publisher each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackReport {
    pub id: u32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    /// Raw emotion index, -1 when the classifier had nothing to say
    pub emotion_index: i32,
}

#[derive(Debug, Clone, Copy)]
struct SentTrack {
    report: TrackReport,
    at: Instant,
}

/// Serializes pipeline state into rate-limited OSC messages
pub struct OscPublisher {
    sink: Box<dyn OscSink>,
    min_intervals: [Duration; KIND_COUNT],
    last_sent: [Option<Instant>; KIND_COUNT],
    resend_cooldown: Duration,
    change_epsilon: f32,
    sent_tracks: HashMap<u32, SentTrack>,
}

impl OscPublisher {
    pub fn new(sink: Box<dyn OscSink>, config: &RelayConfig) -> Self {
        let mut min_intervals = [Duration::ZERO; KIND_COUNT];
        min_intervals[MessageKind::Track as usize] =
            Duration::from_millis(config.track_interval_ms);
        min_intervals[MessageKind::Presence as usize] =
            Duration::from_millis(config.presence_interval_ms);
        min_intervals[MessageKind::Summary as usize] =
            Duration::from_millis(config.summary_interval_ms);
        min_intervals[MessageKind::Word as usize] = Duration::from_millis(config.word_interval_ms);

        Self {
            sink,
            min_intervals,
            last_sent: [None; KIND_COUNT],
            resend_cooldown: Duration::from_secs_f32(config.resend_cooldown_secs),
            change_epsilon: config.change_epsilon,
            sent_tracks: HashMap::new(),
        }
    }

    /// Report every stable track for this tick
    ///
    /// The whole burst shares one rate-limit check, so many tracks in
    /// one frame still emit once each. An individual track is skipped
    /// when its state is unchanged and its resend cooldown has not
    /// elapsed.
    pub fn publish_tracks(&mut self, reports: &[TrackReport], now: Instant) {
        if reports.is_empty() || !self.kind_ready(MessageKind::Track, now) {
            return;
        }

        let mut sent_any = false;
        for report in reports {
            if !self.should_send_track(report, now) {
                continue;
            }
            self.send(
                "/face",
                vec![
                    OscType::Int(report.id as i32),
                    OscType::Float(report.cx),
                    OscType::Float(report.cy),
                    OscType::Float(report.w),
                    OscType::Float(report.h),
                    OscType::Int(report.emotion_index),
                ],
            );
            self.sent_tracks.insert(
                report.id,
                SentTrack {
                    report: *report,
                    at: now,
                },
            );
            sent_any = true;
        }
        if sent_any {
            self.mark_sent(MessageKind::Track, now);
        }
    }

    /// Heartbeat for ticks with no stable track at all
    pub fn publish_no_face(&mut self, now: Instant) {
        if !self.kind_ready(MessageKind::Presence, now) {
            return;
        }
        self.send("/no_face", vec![]);
        self.mark_sent(MessageKind::Presence, now);
    }

    /// Emit a closed window's aggregate summary
    pub fn publish_summary(&mut self, summary: &WindowSummary, now: Instant) {
        if !self.kind_ready(MessageKind::Summary, now) {
            log::debug!("aggregate summary throttled");
            return;
        }
        let mut args = vec![
            OscType::String(summary.dominant.name().to_string()),
            OscType::Int(summary.dominant.index() as i32),
        ];
        for category in Category::ALL {
            args.push(OscType::Int(summary.count(category) as i32));
        }
        self.send("/agent_emotion", args);
        self.mark_sent(MessageKind::Summary, now);
    }

    /// Pass a free-text description through untouched
    pub fn publish_word(&mut self, word: &str, now: Instant) {
        if word.is_empty() || !self.kind_ready(MessageKind::Word, now) {
            return;
        }
        self.send("/agent_word", vec![OscType::String(word.to_string())]);
        self.mark_sent(MessageKind::Word, now);
    }

    /// Announce a configuration value the consumer should adapt to
    pub fn publish_config(&mut self, name: &str, value: f32, now: Instant) {
        self.send(
            "/config",
            vec![OscType::String(name.to_string()), OscType::Float(value)],
        );
        self.mark_sent(MessageKind::Config, now);
    }

    /// Forget per-track send state for tracks that no longer exist
    pub fn retain_tracks(&mut self, live: impl Fn(u32) -> bool) {
        self.sent_tracks.retain(|id, _| live(*id));
    }

    fn kind_ready(&self, kind: MessageKind, now: Instant) -> bool {
        match self.last_sent[kind as usize] {
            Some(at) => now.duration_since(at) >= self.min_intervals[kind as usize],
            None => true,
        }
    }

    fn mark_sent(&mut self, kind: MessageKind, now: Instant) {
        self.last_sent[kind as usize] = Some(now);
    }

    fn should_send_track(&self, report: &TrackReport, now: Instant) -> bool {
        let Some(prev) = self.sent_tracks.get(&report.id) else {
            return true;
        };
        if now.duration_since(prev.at) < self.resend_cooldown {
            return false;
        }
        let eps = self.change_epsilon;
        let changed = report.emotion_index != prev.report.emotion_index
            || (report.cx - prev.report.cx).abs() > eps
            || (report.cy - prev.report.cy).abs() > eps
            || (report.w - prev.report.w).abs() > eps
            || (report.h - prev.report.h).abs() > eps;
        changed
    }

    /// Encode and send one message as one atomic datagram; failures
    /// drop the message, never block or retry
    fn send(&self, addr: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let datagram = match encoder::encode(&packet) {
            Ok(buf) => buf,
            Err(e) => {
                log::warn!("failed to encode {addr} message: {e}");
                return;
            }
        };
        if let Err(e) = self.sink.send(&datagram) {
            log::warn!("dropped {addr} message: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;

    fn publisher(sink: &MemorySink, mutate: impl Fn(&mut RelayConfig)) -> OscPublisher {
        let mut config = RelayConfig::default();
        mutate(&mut config);
        OscPublisher::new(Box::new(sink.clone()), &config)
    }

    fn report(id: u32, cx: f32) -> TrackReport {
        TrackReport {
            id,
            cx,
            cy: 0.5,
            w: 0.2,
            h: 0.2,
            emotion_index: 2,
        }
    }

    #[test]
    fn test_face_message_shape() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |_| {});
        publisher.publish_tracks(&[report(7, 0.25)], Instant::now());

        let messages = sink.messages_to("/face");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].args.len(), 6);
        assert_eq!(messages[0].args[0], OscType::Int(7));
        assert_eq!(messages[0].args[1], OscType::Float(0.25));
        assert_eq!(messages[0].args[5], OscType::Int(2));
    }

    #[test]
    fn test_burst_emits_once_per_track() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |c| c.track_interval_ms = 1000);
        let now = Instant::now();
        publisher.publish_tracks(&[report(1, 0.2), report(2, 0.6), report(3, 0.9)], now);
        assert_eq!(sink.messages_to("/face").len(), 3);

        // Within the per-kind interval the next burst is throttled.
        publisher.publish_tracks(&[report(4, 0.4)], now + Duration::from_millis(10));
        assert_eq!(sink.messages_to("/face").len(), 3);
    }

    #[test]
    fn test_unchanged_track_suppressed_until_cooldown() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |c| c.resend_cooldown_secs = 5.0);
        let now = Instant::now();

        publisher.publish_tracks(&[report(1, 0.5)], now);
        publisher.publish_tracks(&[report(1, 0.5)], now + Duration::from_secs(1));
        assert_eq!(sink.messages_to("/face").len(), 1);

        // Past the cooldown but unchanged: still nothing to say.
        publisher.publish_tracks(&[report(1, 0.5)], now + Duration::from_secs(6));
        assert_eq!(sink.messages_to("/face").len(), 1);

        // A real move resends once the cooldown has passed.
        publisher.publish_tracks(&[report(1, 0.8)], now + Duration::from_secs(7));
        assert_eq!(sink.messages_to("/face").len(), 2);
    }

    #[test]
    fn test_moved_track_within_cooldown_stays_quiet() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |c| c.resend_cooldown_secs = 5.0);
        let now = Instant::now();

        publisher.publish_tracks(&[report(1, 0.5)], now);
        publisher.publish_tracks(&[report(1, 0.9)], now + Duration::from_secs(1));
        assert_eq!(sink.messages_to("/face").len(), 1);
    }

    #[test]
    fn test_summary_args_in_declared_category_order() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |_| {});
        let summary = WindowSummary {
            counts: [5, 0, 1, 2],
            dominant: Category::Active,
            samples: 8,
        };
        publisher.publish_summary(&summary, Instant::now());

        let messages = sink.messages_to("/agent_emotion");
        assert_eq!(messages.len(), 1);
        let args = &messages[0].args;
        assert_eq!(args[0], OscType::String("active".to_string()));
        assert_eq!(args[1], OscType::Int(0));
        assert_eq!(&args[2..], &[
            OscType::Int(5),
            OscType::Int(0),
            OscType::Int(1),
            OscType::Int(2),
        ]);
    }

    #[test]
    fn test_presence_rate_limited_independently_of_tracks() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |c| {
            c.presence_interval_ms = 1000;
            c.track_interval_ms = 0;
        });
        let now = Instant::now();

        publisher.publish_no_face(now);
        publisher.publish_no_face(now + Duration::from_millis(100));
        assert_eq!(sink.messages_to("/no_face").len(), 1);

        // Track stream is not throttled by the presence stream.
        publisher.publish_tracks(&[report(1, 0.5)], now + Duration::from_millis(200));
        assert_eq!(sink.messages_to("/face").len(), 1);

        publisher.publish_no_face(now + Duration::from_millis(1100));
        assert_eq!(sink.messages_to("/no_face").len(), 2);
    }

    #[test]
    fn test_config_and_word_messages() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |_| {});
        let now = Instant::now();

        publisher.publish_config("agent_interval", 36.0, now);
        let messages = sink.messages_to("/config");
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].args,
            vec![
                OscType::String("agent_interval".to_string()),
                OscType::Float(36.0)
            ]
        );

        publisher.publish_word("restless", now);
        publisher.publish_word("", now);
        assert_eq!(sink.messages_to("/agent_word").len(), 1);
    }

    #[test]
    fn test_udp_sink_reports_bad_destination_as_transport_error() {
        let err = UdpSink::connect("not a socket address").unwrap_err();
        assert!(matches!(err, crate::error::RelayError::Transport(_)));
    }

    #[test]
    fn test_retain_tracks_resets_first_send() {
        let sink = MemorySink::new();
        let mut publisher = publisher(&sink, |_| {});
        let now = Instant::now();

        publisher.publish_tracks(&[report(1, 0.5)], now);
        publisher.retain_tracks(|_| false);
        // Same state, but the track was pruned, so it counts as new.
        publisher.publish_tracks(&[report(1, 0.5)], now + Duration::from_millis(1));
        assert_eq!(sink.messages_to("/face").len(), 2);
    }
}
