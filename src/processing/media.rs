use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Container-level frame writer. The byte layout of the container is the
/// sink implementation's business; the session only guarantees strictly
/// increasing frame indices and exactly one `finalize`.
pub trait VideoSink: Send {
    fn write_frame(&mut self, index: u64, data: &[u8]) -> io::Result<()>;

    fn finalize(&mut self) -> io::Result<()>;
}

/// Container-level audio writer. Blocks arrive in capture order, possibly
/// coalesced.
pub trait AudioSink: Send {
    fn write_block(&mut self, data: &[u8]) -> io::Result<()>;

    fn finalize(&mut self) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct VideoSinkState {
    pub frame_indices: Vec<u64>,
    pub bytes_written: u64,
    pub finalize_calls: u32,
}

/// In-memory video sink that records what was written to it. The shared
/// state handle stays valid after the sink is consumed by a session, which
/// is what the tests assert against.
pub struct MemoryVideoSink {
    state: Arc<Mutex<VideoSinkState>>,
}

impl MemoryVideoSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VideoSinkState::default())),
        }
    }

    pub fn state(&self) -> Arc<Mutex<VideoSinkState>> {
        self.state.clone()
    }
}

impl Default for MemoryVideoSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for MemoryVideoSink {
    fn write_frame(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.frame_indices.push(index);
        state.bytes_written += data.len() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().finalize_calls += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct AudioSinkState {
    pub bytes_written: u64,
    pub block_count: u64,
    pub finalize_calls: u32,
}

pub struct MemoryAudioSink {
    state: Arc<Mutex<AudioSinkState>>,
}

impl MemoryAudioSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AudioSinkState::default())),
        }
    }

    pub fn state(&self) -> Arc<Mutex<AudioSinkState>> {
        self.state.clone()
    }
}

impl Default for MemoryAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for MemoryAudioSink {
    fn write_block(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.bytes_written += data.len() as u64;
        state.block_count += 1;
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().finalize_calls += 1;
        Ok(())
    }
}

/// File-backed sink appending raw frame bytes. Suitable for elementary
/// streams (MJPEG, raw PCM) that the encode stage wraps later.
pub struct RawFileVideoSink {
    writer: BufWriter<File>,
}

impl RawFileVideoSink {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl VideoSink for RawFileVideoSink {
    fn write_frame(&mut self, _index: u64, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn finalize(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

pub struct RawFileAudioSink {
    writer: BufWriter<File>,
}

impl RawFileAudioSink {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl AudioSink for RawFileAudioSink {
    fn write_block(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn finalize(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
