use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::config::RecorderConfig;
use crate::capture::{
    collect_frames, AudioIngestBuffer, AudioSource, FrameSource, IngestMode,
};
use crate::error::{RecorderError, Result};
use crate::pacing::FramePacer;
use crate::processing::media::{AudioSink, VideoSink};
use crate::processing::{write_samples, AudioLane, WriterOutcome};
use crate::types::{AudioConfig, RecorderEvent, VideoConfig};

const WARMUP_SLICE: Duration = Duration::from_millis(10);

/// Lifecycle of one recording session. The session object is not reusable;
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Recording = 1,
    Stopping = 2,
    Stopped = 3,
}

/// Single atomic cell guarding the state-machine transitions. All lifecycle
/// decisions go through `transition`, so at most one caller ever wins the
/// Recording -> Stopping edge and runs finalization.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            0 => SessionState::Idle,
            1 => SessionState::Recording,
            2 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }

    fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Owns the capture and writer threads for one session.
pub struct RecorderInner {
    state: StateCell,
    cancel: Arc<AtomicBool>,
    audio_done: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<RecorderError>>>,
    capture_handle: Mutex<Option<JoinHandle<u64>>>,
    writer_handle: Mutex<Option<JoinHandle<Result<WriterOutcome>>>>,
    audio_source: Mutex<Option<Box<dyn AudioSource>>>,
    audio_buffer: Option<Arc<AudioIngestBuffer>>,
    events: Sender<RecorderEvent>,
    video: VideoConfig,
    audio_format: Option<AudioConfig>,
    drift_tolerance: Duration,
}

impl RecorderInner {
    pub fn init(
        config: &RecorderConfig,
        frame_source: Box<dyn FrameSource>,
        mut audio_source: Option<Box<dyn AudioSource>>,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
        events: Sender<RecorderEvent>,
    ) -> Result<Self> {
        let video = frame_source.video_config();
        info!(
            "Initializing session: {}x{} @ {}/{} fps, audio: {}",
            video.width,
            video.height,
            video.fps_num,
            video.fps_den,
            config.capture_audio()
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let audio_done = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));

        let mut audio_buffer = None;
        let mut audio_lane = None;
        let mut audio_format = None;

        if config.capture_audio() {
            let Some(source) = audio_source.as_mut() else {
                return Err(RecorderError::FailedToStart(
                    "audio capture enabled but no audio source supplied".to_string(),
                ));
            };
            if audio_sink.is_none() {
                return Err(RecorderError::FailedToStart(
                    "audio capture enabled but no audio sink supplied".to_string(),
                ));
            }
            audio_format = Some(source.audio_config());

            match config.ingest_mode() {
                IngestMode::Buffered => {
                    let buffer = Arc::new(AudioIngestBuffer::new(
                        config.overflow_policy(),
                        config.ring_capacity_bytes(),
                    ));
                    let producer_buffer = buffer.clone();
                    source.start(Box::new(move |block| producer_buffer.push(block)))?;

                    // Audio subsystems deliver with variable startup latency;
                    // hold the video timeline until real data flows or the
                    // timeout passes.
                    buffer.wait_for_data(config.audio_startup_timeout(), &cancel);
                    audio_lane = Some(AudioLane::Buffered(buffer.clone()));
                    audio_buffer = Some(buffer);
                }
                IngestMode::PushThrough => {
                    let (block_tx, block_rx) = channel();
                    source.start(Box::new(move |block| {
                        let _ = block_tx.send(block);
                    }))?;
                    audio_lane = Some(AudioLane::Direct(block_rx));
                }
            }
        } else {
            audio_source = None;
        }

        // Warm-up discard: everything captured before the epoch is thrown
        // away so the first retained audio byte and the first video frame
        // describe the same instant.
        let mut remaining = config.warmup();
        while remaining > Duration::ZERO && !cancel.load(Ordering::Relaxed) {
            let slice = remaining.min(WARMUP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }

        let epoch = Instant::now();
        let pacer = FramePacer::with_start(epoch, video.fps_num, video.fps_den);

        let (frame_tx, frame_rx) = channel();
        let capture_cancel = cancel.clone();
        let capture_failure = failure.clone();
        let capture_handle = std::thread::spawn(move || {
            collect_frames(frame_source, frame_tx, capture_cancel, pacer, capture_failure)
        });

        let writer_cancel = cancel.clone();
        let writer_audio_done = audio_done.clone();
        let audio_sink = if config.capture_audio() { audio_sink } else { None };
        let writer_handle = std::thread::spawn(move || {
            write_samples(
                video_sink,
                audio_sink,
                frame_rx,
                audio_lane,
                writer_cancel,
                writer_audio_done,
                epoch,
            )
        });

        let _ = events.send(RecorderEvent::SessionStarted {
            output_dir: config.output_dir().clone(),
        });

        let inner = Self {
            state: StateCell::new(SessionState::Recording),
            cancel,
            audio_done,
            failure,
            capture_handle: Mutex::new(Some(capture_handle)),
            writer_handle: Mutex::new(Some(writer_handle)),
            audio_source: Mutex::new(audio_source),
            audio_buffer,
            events,
            video,
            audio_format,
            drift_tolerance: config.drift_tolerance(),
        };
        info!("Session initialized and recording");
        Ok(inner)
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state.get() == SessionState::Recording
    }

    /// Stops the session. Idempotent: the caller that wins the
    /// Recording -> Stopping transition runs the flush/join/finalize
    /// sequence exactly once; everyone else returns Ok immediately.
    pub fn stop(&self) -> Result<()> {
        if !self.state.transition(SessionState::Recording, SessionState::Stopping) {
            info!("Stop requested but session is already {:?}", self.state.get());
            return Ok(());
        }
        info!("Stopping session");
        self.cancel.store(true, Ordering::Relaxed);

        let mut frames_captured = 0;
        if let Some(handle) = self.capture_handle.lock().unwrap().take() {
            match handle.join() {
                Ok(count) => frames_captured = count,
                Err(_) => error!("Capture thread panicked"),
            }
        }

        // Producer stops before the writer's final drain so the drain can
        // terminate on "producer done and buffer empty".
        if let Some(mut source) = self.audio_source.lock().unwrap().take() {
            source.stop();
        }
        self.audio_done.store(true, Ordering::Relaxed);

        let writer_result = match self.writer_handle.lock().unwrap().take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(RecorderError::Generic("Writer thread panicked".to_string()))),
            None => Ok(WriterOutcome::default()),
        };

        self.state.set(SessionState::Stopped);

        let outcome = match writer_result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Writer failed: {}", e);
                let _ = self.events.send(RecorderEvent::Warning(e.to_string()));
                return Err(e);
            }
        };

        if let Some(buffer) = &self.audio_buffer {
            let dropped = buffer.dropped_bytes();
            if dropped > 0 {
                let _ = self
                    .events
                    .send(RecorderEvent::AudioOverflow { dropped_bytes: dropped });
            }
        }
        self.report_drift(&outcome);

        info!(
            "Session stopped: {} frames captured, {} written, {} audio bytes",
            frames_captured, outcome.frames_written, outcome.audio_bytes_written
        );
        let _ = self.events.send(RecorderEvent::SessionStopped {
            frames_written: outcome.frames_written,
            audio_bytes_written: outcome.audio_bytes_written,
        });

        // A per-frame capture failure was absorbed as an implicit stop;
        // surface it now that finalization is complete.
        if let Some(parked) = self.failure.lock().unwrap().take() {
            return Err(parked);
        }
        Ok(())
    }

    /// Compares the written video and audio timeline lengths. A delta above
    /// the tolerance is reported as a warning, never an abort.
    fn report_drift(&self, outcome: &WriterOutcome) {
        let Some(audio_format) = self.audio_format else {
            return;
        };
        if outcome.audio_bytes_written == 0 || outcome.frames_written == 0 {
            return;
        }
        let video_secs = outcome.frames_written as f64 * self.video.fps_den as f64
            / self.video.fps_num as f64;
        let audio_secs =
            outcome.audio_bytes_written as f64 / audio_format.bytes_per_second() as f64;
        let delta = Duration::from_secs_f64((video_secs - audio_secs).abs());
        if delta > self.drift_tolerance {
            warn!(
                "Audio/video duration delta {:?} exceeds tolerance {:?}",
                delta, self.drift_tolerance
            );
            let _ = self.events.send(RecorderEvent::SyncDrift { delta });
        }
    }
}

impl Drop for RecorderInner {
    fn drop(&mut self) {
        if self.state.get() == SessionState::Recording {
            warn!("Session dropped while recording; forcing stop");
            let _ = self.stop();
        }
    }
}
