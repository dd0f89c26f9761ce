use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::Result;
use crate::types::{AudioBlock, AudioConfig, VideoConfig};

/// Callback invoked by an [`AudioSource`] whenever a block of captured audio
/// is available. Runs on a context owned by the audio subsystem.
pub type AudioCallback = Box<dyn FnMut(AudioBlock) + Send>;

/// One platform frame grabber. `grab_frame` returns a frame already encoded
/// in the format the video sink expects; the pixel-capture algorithm itself
/// lives below this trait.
pub trait FrameSource: Send {
    fn video_config(&self) -> VideoConfig;

    fn grab_frame(&mut self) -> Result<Vec<u8>>;
}

/// A push-driven audio capture source. Delivery begins some variable time
/// after `start` returns; the session compensates with its warm-up wait.
pub trait AudioSource: Send {
    fn audio_config(&self) -> AudioConfig;

    fn start(&mut self, deliver: AudioCallback) -> Result<()>;

    fn stop(&mut self);
}

/// Frame source producing solid-color frames at the configured dimensions.
/// Used by the demo binary and the integration tests; also doubles as a
/// fault injector via `fail_after`.
pub struct SyntheticFrameSource {
    config: VideoConfig,
    fill: u8,
    frames_served: u64,
    fail_after: Option<u64>,
}

impl SyntheticFrameSource {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            config,
            fill: 0x80,
            frames_served: 0,
            fail_after: None,
        }
    }

    /// Fail the grab after `count` successful frames. Test hook for the
    /// implicit-stop path.
    pub fn fail_after(mut self, count: u64) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl FrameSource for SyntheticFrameSource {
    fn video_config(&self) -> VideoConfig {
        self.config
    }

    fn grab_frame(&mut self) -> Result<Vec<u8>> {
        if let Some(limit) = self.fail_after {
            if self.frames_served >= limit {
                return Err(crate::error::RecorderError::DeviceUnavailable(
                    "synthetic capture source exhausted".to_string(),
                ));
            }
        }
        self.frames_served += 1;
        // 4 bytes per pixel, BGRA-shaped. Content is irrelevant here.
        let size = self.config.width as usize * self.config.height as usize * 4;
        Ok(vec![self.fill; size])
    }
}

/// Audio source that delivers silent PCM blocks at real-time rate from a
/// dedicated producer thread, mimicking the callback cadence of a loopback
/// capture (~10ms packets).
pub struct SilenceAudioSource {
    config: AudioConfig,
    block_interval: Duration,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl SilenceAudioSource {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            block_interval: Duration::from_millis(10),
            running: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }
}

impl AudioSource for SilenceAudioSource {
    fn audio_config(&self) -> AudioConfig {
        self.config
    }

    fn start(&mut self, mut deliver: AudioCallback) -> Result<()> {
        let block_bytes = (self.config.bytes_per_second() as u128
            * self.block_interval.as_nanos()
            / 1_000_000_000) as usize;
        let interval = self.block_interval;
        let running = self.running.clone();
        running.store(true, Ordering::Relaxed);

        self.producer = Some(std::thread::spawn(move || {
            info!("Silence audio producer started ({} byte blocks)", block_bytes);
            let mut next_due = Instant::now();
            while running.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now < next_due {
                    spin_sleep::sleep(next_due - now);
                }
                deliver(AudioBlock::new(vec![0u8; block_bytes]));
                next_due += interval;
            }
            info!("Silence audio producer stopped");
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!("Audio producer thread panicked during stop");
            }
        }
    }
}

impl Drop for SilenceAudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn synthetic_source_fails_after_limit() {
        let mut source = SyntheticFrameSource::new(VideoConfig::new(64, 64, 30, 1)).fail_after(2);
        assert!(source.grab_frame().is_ok());
        assert!(source.grab_frame().is_ok());
        assert!(source.grab_frame().is_err());
    }

    #[test]
    fn silence_source_delivers_blocks_until_stopped() {
        let mut source = SilenceAudioSource::new(AudioConfig::default());
        let delivered = Arc::new(Mutex::new(0usize));
        let sink = delivered.clone();
        source
            .start(Box::new(move |block| {
                *sink.lock().unwrap() += block.len();
            }))
            .unwrap();
        std::thread::sleep(Duration::from_millis(60));
        source.stop();
        let bytes = *delivered.lock().unwrap();
        assert!(bytes > 0, "producer never delivered");
        let after_stop = bytes;
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(*delivered.lock().unwrap(), after_stop);
    }
}
