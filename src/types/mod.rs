use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Video timeline parameters. Dimensions are forced to even values because
/// most encoders reject odd frame sizes.
#[derive(Debug, Clone, Copy)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

impl VideoConfig {
    pub fn new(width: u32, height: u32, fps_num: u32, fps_den: u32) -> Self {
        Self {
            width: width - (width % 2),
            height: height - (height % 2),
            fps_num,
            fps_den,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 * self.fps_den as u64 / self.fps_num as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AudioConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl AudioConfig {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    pub fn bytes_per_sample(&self) -> u32 {
        (self.channels as u32 * self.bits_per_sample as u32) / 8
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.bytes_per_sample()
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new(2, 44100, 16)
    }
}

/// One captured video frame, already encoded into the sink's frame format.
pub struct VideoFrame {
    pub index: u64,
    pub data: Vec<u8>,
}

/// A timestamped span of raw audio handed from the producer callback into
/// the ingest buffer. Ownership moves with the block.
pub struct AudioBlock {
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl AudioBlock {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            captured_at: Instant::now(),
        }
    }

    pub fn with_timestamp(data: Vec<u8>, captured_at: Instant) -> Self {
        Self { data, captured_at }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Typed status events published by sessions and encode jobs. The
/// presentation layer subscribes to these instead of being called back
/// directly from background threads.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    SessionStarted {
        output_dir: PathBuf,
    },
    SessionStopped {
        frames_written: u64,
        audio_bytes_written: u64,
    },
    SegmentOpened {
        index: u32,
        path: PathBuf,
    },
    SegmentClosed {
        index: u32,
        path: PathBuf,
    },
    /// Audio/video timeline delta at finalize exceeded the tolerance.
    /// Reported, never aborting.
    SyncDrift {
        delta: Duration,
    },
    AudioOverflow {
        dropped_bytes: u64,
    },
    EncodeProgress {
        percent: u8,
    },
    Warning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_config_forces_even_dimensions() {
        let config = VideoConfig::new(1921, 1081, 30, 1);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
    }

    #[test]
    fn frame_duration_from_rational_rate() {
        let config = VideoConfig::new(1920, 1080, 24, 1);
        assert_eq!(config.frame_duration(), Duration::from_nanos(41_666_666));

        let ntsc = VideoConfig::new(1920, 1080, 30000, 1001);
        assert_eq!(ntsc.frame_duration(), Duration::from_nanos(33_366_666));
    }

    #[test]
    fn audio_config_byte_rates() {
        let config = AudioConfig::new(2, 44100, 16);
        assert_eq!(config.bytes_per_sample(), 4);
        assert_eq!(config.bytes_per_second(), 176_400);
    }
}
