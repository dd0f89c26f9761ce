mod config;
mod inner;
pub mod utils;

// Re-export public types from config
pub use self::config::{RecorderConfig, RecorderConfigBuilder};
pub use self::inner::SessionState;

use self::inner::RecorderInner;
use crate::capture::{AudioSource, FrameSource};
use crate::error::{RecorderError, Result};
use crate::processing::media::{AudioSink, VideoSink};
use crate::types::RecorderEvent;
use log::info;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const STOP_TIMER_SLICE: Duration = Duration::from_millis(20);

/// Command/query surface over one recording session at a time.
///
/// `start` allocates sinks and spawns the capture machinery on background
/// threads; `stop` blocks only for the flush-and-join sequence and is safe
/// to call from any thread, any number of times. Status flows back through
/// the typed event channel rather than callbacks into the caller.
pub struct Recorder {
    config: RecorderConfig,
    inner: Mutex<Option<Arc<RecorderInner>>>,
    events_tx: Sender<RecorderEvent>,
    events_rx: Mutex<Option<Receiver<RecorderEvent>>>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            config,
            inner: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    // Get a configuration builder to create a new configuration
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfig::builder()
    }

    /// Get the current configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The receiving end of the status/progress event channel. Can be taken
    /// once; subsequent calls return None.
    pub fn take_events(&self) -> Option<Receiver<RecorderEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Begin recording. Fails if a session is already active on this
    /// recorder. An optional auto-stop timer shares the same cancellation
    /// authority as manual stop, so at most one finalize sequence runs.
    pub fn start(
        &self,
        frame_source: Box<dyn FrameSource>,
        audio_source: Option<Box<dyn AudioSource>>,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
    ) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        if guard.as_ref().is_some_and(|inner| inner.is_recording()) {
            return Err(RecorderError::FailedToStart(
                "a session is already recording".to_string(),
            ));
        }

        let inner = Arc::new(
            RecorderInner::init(
                &self.config,
                frame_source,
                audio_source,
                video_sink,
                audio_sink,
                self.events_tx.clone(),
            )
            .map_err(|e| match e {
                e @ RecorderError::FailedToStart(_) => e,
                other => RecorderError::FailedToStart(other.to_string()),
            })?,
        );

        if let Some(limit) = self.config.stop_after() {
            spawn_stop_timer(inner.clone(), limit);
        }

        *guard = Some(inner);
        Ok(())
    }

    /// Stop the current recording. Idempotent: stopping an already stopped
    /// (or never started) recorder is a no-op.
    pub fn stop(&self) -> Result<()> {
        let inner = self.inner.lock().unwrap().clone();
        match inner {
            Some(inner) => inner.stop(),
            None => Ok(()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|inner| inner.is_recording())
    }

    pub fn state(&self) -> SessionState {
        self.inner
            .lock()
            .unwrap()
            .as_ref()
            .map_or(SessionState::Idle, |inner| inner.state())
    }
}

/// "Stop after N minutes" timer. Goes through the same idempotent stop path
/// as everything else, so racing a manual stop cannot double-finalize.
fn spawn_stop_timer(inner: Arc<RecorderInner>, limit: Duration) {
    std::thread::spawn(move || {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if !inner.is_recording() {
                return;
            }
            std::thread::sleep(STOP_TIMER_SLICE);
        }
        info!("Auto-stop timer fired after {:?}", limit);
        if let Err(e) = inner.stop() {
            log::error!("Auto-stop failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SilenceAudioSource, SyntheticFrameSource};
    use crate::processing::media::{MemoryAudioSink, MemoryVideoSink};
    use crate::types::AudioConfig;

    fn quick_config() -> RecorderConfig {
        RecorderConfig::builder()
            .fps(60, 1)
            .dimensions(32, 32)
            .warmup(Duration::from_millis(0))
            .audio_startup_timeout(Duration::from_millis(200))
            .build()
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let recorder = Recorder::new(quick_config());
        assert!(recorder.stop().is_ok());
        assert_eq!(recorder.state(), SessionState::Idle);
    }

    #[test]
    fn second_start_while_recording_is_rejected() {
        let recorder = Recorder::new(quick_config());
        let video = recorder.config().video_config();
        recorder
            .start(
                Box::new(SyntheticFrameSource::new(video)),
                Some(Box::new(SilenceAudioSource::new(AudioConfig::default()))),
                Box::new(MemoryVideoSink::new()),
                Some(Box::new(MemoryAudioSink::new())),
            )
            .unwrap();
        assert!(recorder.is_recording());

        let again = recorder.start(
            Box::new(SyntheticFrameSource::new(video)),
            None,
            Box::new(MemoryVideoSink::new()),
            None,
        );
        assert!(matches!(again, Err(RecorderError::FailedToStart(_))));

        recorder.stop().unwrap();
        assert_eq!(recorder.state(), SessionState::Stopped);
    }

    #[test]
    fn auto_stop_timer_finalizes_once() {
        let config = RecorderConfig::builder()
            .fps(60, 1)
            .dimensions(32, 32)
            .capture_audio(false)
            .warmup(Duration::ZERO)
            .stop_after(Duration::from_millis(150))
            .build();
        let recorder = Recorder::new(config);
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

        std::thread::sleep(Duration::from_millis(400));
        assert!(!recorder.is_recording());
        // Manual stop after the timer fired must not re-finalize.
        recorder.stop().unwrap();
        assert_eq!(sink_state.lock().unwrap().finalize_calls, 1);
    }
}
