pub mod media;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::capture::AudioIngestBuffer;
use crate::error::{RecorderError, Result};
use crate::types::{AudioBlock, VideoFrame};

use media::{AudioSink, VideoSink};

const AUDIO_CHUNK_BYTES: usize = 64 * 1024;
const IDLE_SLEEP: Duration = Duration::from_millis(1);
const DRAIN_RETRIES: u32 = 50;
const DRAIN_RETRY_SLEEP: Duration = Duration::from_millis(10);

/// How audio reaches the writer: drained from the ingest buffer, or pushed
/// straight through a channel by the producer callback.
pub enum AudioLane {
    Buffered(Arc<AudioIngestBuffer>),
    Direct(Receiver<AudioBlock>),
}

impl AudioLane {
    /// Next span of audio bytes in arrival order, dropping anything captured
    /// before `epoch` (warm-up discard). Empty result means nothing pending.
    fn next_chunk(&mut self, epoch: Instant) -> Vec<u8> {
        match self {
            AudioLane::Buffered(buffer) => {
                buffer.discard_before(epoch);
                buffer.drain(AUDIO_CHUNK_BYTES)
            }
            AudioLane::Direct(rx) => {
                let mut out = Vec::new();
                while out.len() < AUDIO_CHUNK_BYTES {
                    match rx.try_recv() {
                        Ok(block) => {
                            if block.captured_at >= epoch {
                                out.extend_from_slice(&block.data);
                            }
                        }
                        Err(_) => break,
                    }
                }
                out
            }
        }
    }

    fn has_pending(&self) -> bool {
        match self {
            AudioLane::Buffered(buffer) => buffer.has_data(),
            // A channel cannot be peeked; the retry loop handles stragglers.
            AudioLane::Direct(_) => false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WriterOutcome {
    pub frames_written: u64,
    pub audio_bytes_written: u64,
    pub residual_audio_bytes: u64,
}

/// Single consumer loop: receives video frames in index order, drains the
/// audio lane, and writes both sinks. Finalizes the sinks exactly once on
/// the way out, even when a write fails mid-stream (partial artifacts are
/// kept for diagnosis).
pub fn write_samples(
    mut video_sink: Box<dyn VideoSink>,
    mut audio_sink: Option<Box<dyn AudioSink>>,
    frames: Receiver<VideoFrame>,
    mut audio: Option<AudioLane>,
    cancel: Arc<AtomicBool>,
    audio_done: Arc<AtomicBool>,
    epoch: Instant,
) -> Result<WriterOutcome> {
    info!("Sample writer started");
    let mut outcome = WriterOutcome::default();
    let mut write_error: Option<RecorderError> = None;
    let mut frames_closed = false;

    'writer: while !frames_closed {
        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    debug_assert_eq!(frame.index, outcome.frames_written);
                    if let Err(e) = video_sink.write_frame(frame.index, &frame.data) {
                        write_error = Some(e.into());
                        cancel.store(true, Ordering::Relaxed);
                        break 'writer;
                    }
                    outcome.frames_written += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    frames_closed = true;
                    break;
                }
            }
        }

        if let (Some(lane), Some(sink)) = (audio.as_mut(), audio_sink.as_mut()) {
            let chunk = lane.next_chunk(epoch);
            if !chunk.is_empty() {
                if let Err(e) = sink.write_block(&chunk) {
                    write_error = Some(e.into());
                    cancel.store(true, Ordering::Relaxed);
                    break 'writer;
                }
                outcome.audio_bytes_written += chunk.len() as u64;
            }
        }

        if !frames_closed {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    // Final drain: the producer may still be flushing its last blocks when
    // the capture loop exits. Bounded retries, then discard the residual
    // rather than hanging the stop path.
    if write_error.is_none() {
        if let (Some(lane), Some(sink)) = (audio.as_mut(), audio_sink.as_mut()) {
            for _ in 0..DRAIN_RETRIES {
                let chunk = lane.next_chunk(epoch);
                if !chunk.is_empty() {
                    match sink.write_block(&chunk) {
                        Ok(()) => outcome.audio_bytes_written += chunk.len() as u64,
                        Err(e) => {
                            write_error = Some(e.into());
                            break;
                        }
                    }
                }
                if audio_done.load(Ordering::Relaxed) && !lane.has_pending() {
                    break;
                }
                std::thread::sleep(DRAIN_RETRY_SLEEP);
            }
            if let AudioLane::Buffered(buffer) = lane {
                outcome.residual_audio_bytes = buffer.buffered_bytes() as u64;
                if outcome.residual_audio_bytes > 0 {
                    warn!(
                        "Discarding {} residual audio bytes after drain retries",
                        outcome.residual_audio_bytes
                    );
                }
            }
        }
    }

    if let Err(e) = video_sink.finalize() {
        warn!("Video sink finalize failed: {}", e);
        write_error.get_or_insert(e.into());
    }
    if let Some(sink) = audio_sink.as_mut() {
        if let Err(e) = sink.finalize() {
            warn!("Audio sink finalize failed: {}", e);
            write_error.get_or_insert(e.into());
        }
    }

    match write_error {
        Some(e) => Err(e),
        None => {
            info!(
                "Sample writer finished: {} frames, {} audio bytes",
                outcome.frames_written, outcome.audio_bytes_written
            );
            Ok(outcome)
        }
    }
}
