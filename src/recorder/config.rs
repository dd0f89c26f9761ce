use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{IngestMode, OverflowPolicy};
use crate::types::{AudioConfig, VideoConfig};

#[derive(Clone)]
pub struct RecorderConfig {
    // Video settings
    fps_num: u32,
    fps_den: u32,
    width: u32,
    height: u32,

    // Audio settings
    capture_audio: bool,
    audio_format: AudioConfig,
    overflow_policy: OverflowPolicy,
    ingest_mode: IngestMode,
    ring_capacity_bytes: usize,
    warmup: Duration,
    audio_startup_timeout: Duration,

    // Session settings
    output_dir: PathBuf,
    stop_after: Option<Duration>,
    drift_tolerance: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            fps_num: 30,
            fps_den: 1,
            width: 1920,
            height: 1080,
            capture_audio: true,
            audio_format: AudioConfig::default(),
            // Open question in the source history; drop-oldest keeps the
            // producer latency bounded and is the documented default.
            overflow_policy: OverflowPolicy::DropOldest,
            ingest_mode: IngestMode::Buffered,
            ring_capacity_bytes: 4 * 1024 * 1024,
            warmup: Duration::from_secs(2),
            audio_startup_timeout: Duration::from_secs(3),
            output_dir: PathBuf::from("."),
            stop_after: None,
            drift_tolerance: Duration::from_millis(100),
        }
    }
}

impl RecorderConfig {
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }

    // Getter methods
    pub fn fps_num(&self) -> u32 { self.fps_num }
    pub fn fps_den(&self) -> u32 { self.fps_den }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn capture_audio(&self) -> bool { self.capture_audio }
    pub fn audio_format(&self) -> AudioConfig { self.audio_format }
    pub fn overflow_policy(&self) -> OverflowPolicy { self.overflow_policy }
    pub fn ingest_mode(&self) -> IngestMode { self.ingest_mode }
    pub fn ring_capacity_bytes(&self) -> usize { self.ring_capacity_bytes }
    pub fn warmup(&self) -> Duration { self.warmup }
    pub fn audio_startup_timeout(&self) -> Duration { self.audio_startup_timeout }
    pub fn output_dir(&self) -> &PathBuf { &self.output_dir }
    pub fn stop_after(&self) -> Option<Duration> { self.stop_after }
    pub fn drift_tolerance(&self) -> Duration { self.drift_tolerance }

    /// Dimensions pass through [`VideoConfig::new`], which clamps them even.
    pub fn video_config(&self) -> VideoConfig {
        VideoConfig::new(self.width, self.height, self.fps_num, self.fps_den)
    }
}

#[derive(Default)]
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fps(mut self, num: u32, den: u32) -> Self {
        self.config.fps_num = num;
        self.config.fps_den = den;
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn capture_audio(mut self, enabled: bool) -> Self {
        self.config.capture_audio = enabled;
        self
    }

    pub fn audio_format(mut self, format: AudioConfig) -> Self {
        self.config.audio_format = format;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    pub fn ingest_mode(mut self, mode: IngestMode) -> Self {
        self.config.ingest_mode = mode;
        self
    }

    pub fn ring_capacity_bytes(mut self, bytes: usize) -> Self {
        self.config.ring_capacity_bytes = bytes;
        self
    }

    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.config.warmup = warmup;
        self
    }

    pub fn audio_startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.audio_startup_timeout = timeout;
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn stop_after(mut self, limit: impl Into<Option<Duration>>) -> Self {
        self.config.stop_after = limit.into();
        self
    }

    pub fn drift_tolerance(mut self, tolerance: Duration) -> Self {
        self.config.drift_tolerance = tolerance;
        self
    }

    pub fn build(self) -> RecorderConfig {
        self.config
    }
}
