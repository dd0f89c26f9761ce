mod audio;
mod source;
mod video;

pub use audio::{AudioIngestBuffer, IngestMode, OverflowPolicy};
pub use source::{AudioCallback, AudioSource, FrameSource, SilenceAudioSource, SyntheticFrameSource};
pub use video::collect_frames;
