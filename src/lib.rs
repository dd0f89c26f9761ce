// Private modules
mod capture;
mod device;
mod error;
mod pacing;
mod processing;
mod recorder;
mod types;

// The orchestration layers are public as modules; their internals carry
// enough surface (argument builders, progress parsing) that a flat
// re-export would be noisy.
pub mod encoder;
pub mod logger;
pub mod segment;

pub use capture::{
    AudioCallback, AudioIngestBuffer, AudioSource, FrameSource, IngestMode, OverflowPolicy,
    SilenceAudioSource, SyntheticFrameSource,
};
pub use device::{DeviceLister, DeviceRef, StaticDeviceLister};
pub use error::{RecorderError, Result};
pub use logger::{setup_logger, LoggerConfig};
pub use pacing::FramePacer;
pub use processing::media::{
    AudioSink, MemoryAudioSink, MemoryVideoSink, RawFileAudioSink, RawFileVideoSink, VideoSink,
};
pub use recorder::utils::{create_session_dir, session_dir_name};
pub use recorder::{Recorder, RecorderConfig, RecorderConfigBuilder, SessionState};
pub use segment::{SegmentConfig, SegmentStrategy};
pub use types::{AudioBlock, AudioConfig, RecorderEvent, VideoConfig, VideoFrame};
