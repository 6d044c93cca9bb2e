/// Scripted Pipeline Example
///
/// Drives the full pipeline against a scripted detection source: a
/// single face wanders across the frame for a few seconds, cycling
/// through emotions, with a gap in the middle to exercise track death
/// and rebirth. OSC messages go to a real UDP destination, so this can
/// be pointed at a TouchDesigner patch or the loopback listener of
/// your choice.
///
/// Usage:
///   cargo run --example run_scripted [destination]
use scene_relay::{
    Describer, RawDetection, RelayConfig, ScenePipeline, ScriptedSource, UdpSink, WindowSummary,
};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Canned replacement for the language-model description call
struct CannedDescriber;

impl Describer for CannedDescriber {
    fn describe(&mut self, summary: &WindowSummary) -> Option<String> {
        Some(format!("the room feels {}", summary.dominant.name()))
    }
}

fn emotion_scores(dominant: usize) -> Vec<f32> {
    let mut scores = vec![0.05; 7];
    scores[dominant] = 0.7;
    scores
}

fn script() -> Vec<Vec<RawDetection>> {
    let mut frames = Vec::new();

    // A face drifting left to right, mostly happy.
    for i in 0..60 {
        let cx = 0.3 + i as f32 * 0.005;
        let emotion = if i % 10 < 7 { 1 } else { 0 };
        frames.push(vec![RawDetection::new(cx, 0.5, 0.2, 0.25, 0, 0.9)
            .with_emotion_scores(emotion_scores(emotion))]);
    }

    // Occlusion gap: long enough to kill the track.
    for _ in 0..30 {
        frames.push(vec![]);
    }

    // Back, but anxious now.
    for i in 0..60 {
        let cx = 0.6 - i as f32 * 0.003;
        frames.push(vec![RawDetection::new(cx, 0.45, 0.2, 0.25, 0, 0.85)
            .with_emotion_scores(emotion_scores(5))]);
    }

    frames
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let destination = if args.len() > 1 {
        args[1].clone()
    } else {
        "127.0.0.1:5005".to_string()
    };

    let mut config = RelayConfig::default();
    config.fps = 15.0;
    config.max_misses = 20;
    config.destination = destination.clone();

    // 150 scripted frames at 15 fps, plus slack for the last window.
    let runtime = Duration::from_secs_f32(152.0 / config.fps);

    let sink = UdpSink::connect(&config.destination)?;
    let source = ScriptedSource::new(script());
    let mut pipeline = ScenePipeline::with_describer(
        config,
        Box::new(source),
        Box::new(sink),
        Box::new(CannedDescriber),
    )?;
    println!("sending OSC to {destination} for {runtime:?}");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(runtime);
            stop.store(true, Ordering::Relaxed);
        });
    }

    pipeline.run(&stop);
    println!(
        "done: {} ticks, {} live tracks at exit",
        pipeline.tick_count(),
        pipeline.live_tracks()
    );
    Ok(())
}
