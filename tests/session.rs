use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use screenrec::{
    segment, AudioConfig, MemoryAudioSink, MemoryVideoSink, Recorder, RecorderConfig,
    RecorderEvent, SegmentConfig, SegmentStrategy, SilenceAudioSource, SyntheticFrameSource,
    VideoSink,
};

fn session_config() -> RecorderConfig {
    Recorder::builder()
        .fps(50, 1)
        .dimensions(64, 64)
        .warmup(Duration::from_millis(100))
        .audio_startup_timeout(Duration::from_millis(500))
        .build()
}

#[test]
fn session_paces_frames_and_aligns_audio_to_the_epoch() {
    let recorder = Recorder::new(session_config());
    let events = recorder.take_events().unwrap();

    let video_sink = MemoryVideoSink::new();
    let video_state = video_sink.state();
    let audio_sink = MemoryAudioSink::new();
    let audio_state = audio_sink.state();

    let audio_format = AudioConfig::default();
    recorder
        .start(
            Box::new(SyntheticFrameSource::new(recorder.config().video_config())),
            Some(Box::new(SilenceAudioSource::new(audio_format))),
            Box::new(video_sink),
            Some(Box::new(audio_sink)),
        )
        .unwrap();

    let run = Duration::from_millis(500);
    std::thread::sleep(run);
    let elapsed = Instant::now();
    recorder.stop().unwrap();
    let elapsed = elapsed.elapsed() + run;

    let video = video_state.lock().unwrap();
    // Absolute-offset pacing: indices are the frame numbers actually due,
    // strictly increasing from zero, one write per index.
    assert!(!video.frame_indices.is_empty());
    assert_eq!(video.frame_indices[0], 0);
    assert!(video.frame_indices.windows(2).all(|w| w[1] > w[0]));
    let expected = elapsed.as_secs_f64() * 50.0;
    let written = video.frame_indices.len() as f64;
    assert!(
        written <= expected + 3.0,
        "wrote {written} frames for {elapsed:?}, expected at most ~{expected}"
    );
    assert!(written >= 5.0, "only {written} frames written in {elapsed:?}");
    assert_eq!(video.finalize_calls, 1);

    // Warm-up audio is discarded, so the written bytes cover at most the
    // recorded span plus scheduling slack, never warm-up plus span.
    let audio = audio_state.lock().unwrap();
    assert!(audio.bytes_written > 0);
    let ceiling = (elapsed.as_secs_f64() + 0.3) * audio_format.bytes_per_second() as f64;
    assert!(
        (audio.bytes_written as f64) < ceiling,
        "audio bytes {} exceed ceiling {ceiling}",
        audio.bytes_written
    );
    assert_eq!(audio.finalize_calls, 1);

    let collected: Vec<RecorderEvent> = events.try_iter().collect();
    assert!(collected
        .iter()
        .any(|e| matches!(e, RecorderEvent::SessionStarted { .. })));
    assert!(collected.iter().any(|e| matches!(
        e,
        RecorderEvent::SessionStopped { frames_written, .. } if *frames_written > 0
    )));
}

#[test]
fn racing_stops_finalize_exactly_once() {
    let recorder = Arc::new(Recorder::new(
        Recorder::builder()
            .fps(60, 1)
            .dimensions(32, 32)
            .capture_audio(false)
            .warmup(Duration::ZERO)
            .build(),
    ));

    let sink = MemoryVideoSink::new();
    let sink_state = sink.state();
    recorder
        .start(
            Box::new(SyntheticFrameSource::new(recorder.config().video_config())),
            None,
            Box::new(sink),
            None,
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let recorder = recorder.clone();
            std::thread::spawn(move || recorder.stop())
        })
        .collect();
    for handle in stoppers {
        handle.join().unwrap().unwrap();
    }

    assert!(!recorder.is_recording());
    assert_eq!(sink_state.lock().unwrap().finalize_calls, 1);
}

#[test]
fn rotation_produces_contiguous_one_indexed_parts() {
    let config = SegmentConfig {
        interval: Duration::from_millis(150),
        strategy: SegmentStrategy::Rotate,
        stop_after: Some(Duration::from_millis(500)),
        ..SegmentConfig::default()
    };
    let cancel = Arc::new(AtomicBool::new(false));
    let finalize_counts = Arc::new(std::sync::Mutex::new(Vec::new()));

    let counts = finalize_counts.clone();
    let produced = segment::run_rotating(
        std::path::Path::new("/tmp/rotation-test"),
        &config,
        cancel,
        None,
        move |_index, _path| {
            let recorder = Recorder::new(
                Recorder::builder()
                    .fps(60, 1)
                    .dimensions(32, 32)
                    .capture_audio(false)
                    .warmup(Duration::ZERO)
                    .build(),
            );
            let sink = MemoryVideoSink::new();
            counts.lock().unwrap().push(sink.state());
            recorder.start(
                Box::new(SyntheticFrameSource::new(recorder.config().video_config())),
                None,
                Box::new(sink),
                None,
            )?;
            Ok(recorder)
        },
    )
    .unwrap();

    // 500ms at a 150ms interval: parts 1..=4, the last one short.
    assert!(produced.len() >= 2, "expected at least two parts, got {produced:?}");
    let expected: Vec<PathBuf> = (1..=produced.len() as u32)
        .map(|i| PathBuf::from(format!("/tmp/rotation-test/Part_{i:03}.mp4")))
        .collect();
    assert_eq!(produced, expected);

    for state in finalize_counts.lock().unwrap().iter() {
        let state = state.lock().unwrap();
        assert_eq!(state.finalize_calls, 1);
        assert!(!state.frame_indices.is_empty());
    }
}

/// Video sink that timestamps its finalize, so the test can order restarts
/// against finalization.
struct FinalizeClockSink {
    finalized_at: Arc<std::sync::Mutex<Vec<Instant>>>,
}

impl VideoSink for FinalizeClockSink {
    fn write_frame(&mut self, _index: u64, _data: &[u8]) -> std::io::Result<()> {
        Ok(())
    }

    fn finalize(&mut self) -> std::io::Result<()> {
        self.finalized_at.lock().unwrap().push(Instant::now());
        Ok(())
    }
}

#[test]
fn rotation_starts_the_next_part_before_finalizing_the_previous() {
    let config = SegmentConfig {
        interval: Duration::from_millis(150),
        strategy: SegmentStrategy::Rotate,
        stop_after: Some(Duration::from_millis(500)),
        ..SegmentConfig::default()
    };
    let started_at = Arc::new(std::sync::Mutex::new(Vec::new()));
    let finalized_at = Arc::new(std::sync::Mutex::new(Vec::new()));

    let starts = started_at.clone();
    let finalizes = finalized_at.clone();
    let produced = segment::run_rotating(
        std::path::Path::new("/tmp/rotation-gap-test"),
        &config,
        Arc::new(AtomicBool::new(false)),
        None,
        move |_index, _path| {
            starts.lock().unwrap().push(Instant::now());
            let recorder = Recorder::new(
                Recorder::builder()
                    .fps(60, 1)
                    .dimensions(32, 32)
                    .capture_audio(false)
                    .warmup(Duration::ZERO)
                    .build(),
            );
            recorder.start(
                Box::new(SyntheticFrameSource::new(recorder.config().video_config())),
                None,
                Box::new(FinalizeClockSink {
                    finalized_at: finalizes.clone(),
                }),
                None,
            )?;
            Ok(recorder)
        },
    )
    .unwrap();
    assert!(produced.len() >= 2);

    // Coverage never gaps: part N+1 is already live when part N finalizes.
    let starts = started_at.lock().unwrap();
    let finalizes = finalized_at.lock().unwrap();
    assert_eq!(starts.len(), finalizes.len());
    for index in 1..starts.len() {
        assert!(
            starts[index] <= finalizes[index - 1],
            "part {} started after part {} finalized",
            index + 1,
            index
        );
    }
}
