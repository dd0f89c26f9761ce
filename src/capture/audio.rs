use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::warn;

use crate::types::AudioBlock;

/// What to do when a bounded ingest buffer runs out of room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Discard oldest blocks first so the buffer keeps the most recent data.
    /// Never fails the producer. Documented default.
    DropOldest,
    /// Grow without bound; nothing pushed is ever lost. Relies on the
    /// consumer keeping pace.
    Expand,
}

/// How captured audio reaches the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Producer pushes into an [`AudioIngestBuffer`]; the writer drains it.
    #[default]
    Buffered,
    /// Producer hands blocks straight to the writer channel.
    PushThrough,
}

const WAIT_POLL: Duration = Duration::from_millis(5);

struct BufferState {
    blocks: VecDeque<AudioBlock>,
    buffered_bytes: usize,
    pushed_bytes: u64,
    dropped_bytes: u64,
}

/// Bounded producer/consumer buffer decoupling the push-driven audio
/// subsystem from the block-oriented writer. `push` holds the lock only long
/// enough to queue the block, so producer-side latency stays bounded even
/// while the consumer is inside a slow sink write.
pub struct AudioIngestBuffer {
    state: Mutex<BufferState>,
    policy: OverflowPolicy,
    capacity_bytes: usize,
}

impl AudioIngestBuffer {
    pub fn new(policy: OverflowPolicy, capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(BufferState {
                blocks: VecDeque::new(),
                buffered_bytes: 0,
                pushed_bytes: 0,
                dropped_bytes: 0,
            }),
            policy,
            capacity_bytes,
        }
    }

    /// Called from the producer callback. Never blocks for unbounded time
    /// and never fails; under `DropOldest` the oldest blocks make room.
    pub fn push(&self, block: AudioBlock) {
        if block.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.pushed_bytes += block.len() as u64;
        state.buffered_bytes += block.len();
        state.blocks.push_back(block);

        if self.policy == OverflowPolicy::DropOldest {
            let mut newly_dropped = 0u64;
            while state.buffered_bytes > self.capacity_bytes && state.blocks.len() > 1 {
                if let Some(oldest) = state.blocks.pop_front() {
                    state.buffered_bytes -= oldest.len();
                    newly_dropped += oldest.len() as u64;
                }
            }
            // A single block larger than the whole buffer: keep only its
            // newest tail so buffered bytes never exceed capacity.
            if state.buffered_bytes > self.capacity_bytes {
                let excess = state.buffered_bytes - self.capacity_bytes;
                if let Some(only) = state.blocks.front_mut() {
                    only.data.drain(..excess);
                }
                state.buffered_bytes -= excess;
                newly_dropped += excess as u64;
            }
            if newly_dropped > 0 {
                state.dropped_bytes += newly_dropped;
            }
        }
    }

    /// Removes and returns up to `max_bytes`, oldest first, coalesced into
    /// one span. A block straddling the limit is split and its tail kept.
    pub fn drain(&self, max_bytes: usize) -> Vec<u8> {
        let mut state = self.state.lock().unwrap();
        let mut out = Vec::with_capacity(max_bytes.min(state.buffered_bytes));
        while out.len() < max_bytes {
            let Some(mut block) = state.blocks.pop_front() else {
                break;
            };
            let room = max_bytes - out.len();
            if block.len() <= room {
                state.buffered_bytes -= block.len();
                out.extend_from_slice(&block.data);
            } else {
                out.extend_from_slice(&block.data[..room]);
                state.buffered_bytes -= room;
                block.data.drain(..room);
                state.blocks.push_front(block);
            }
        }
        out
    }

    pub fn drain_all(&self) -> Vec<u8> {
        self.drain(usize::MAX)
    }

    /// Discards every block captured before `cutoff`. Used for the warm-up
    /// discard so the retained audio timeline starts at the session epoch.
    /// Not counted as overflow loss.
    pub fn discard_before(&self, cutoff: Instant) -> usize {
        let mut state = self.state.lock().unwrap();
        let mut discarded = 0;
        while let Some(front) = state.blocks.front() {
            if front.captured_at >= cutoff {
                break;
            }
            let block = state.blocks.pop_front().unwrap();
            state.buffered_bytes -= block.len();
            discarded += block.len();
        }
        discarded
    }

    /// Polls until a first real block has arrived, the timeout elapses, or
    /// the cancel flag is raised. Returns true once data is present.
    pub fn wait_for_data(&self, timeout: Duration, cancel: &AtomicBool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.has_data() {
                return true;
            }
            if cancel.load(Ordering::Relaxed) || Instant::now() >= deadline {
                if !cancel.load(Ordering::Relaxed) {
                    warn!(
                        "No audio arrived within {:?}; timeline may start without audio",
                        timeout
                    );
                }
                return false;
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    pub fn has_data(&self) -> bool {
        self.buffered_bytes() > 0
    }

    pub fn buffered_bytes(&self) -> usize {
        self.state.lock().unwrap().buffered_bytes
    }

    pub fn pushed_bytes(&self) -> u64 {
        self.state.lock().unwrap().pushed_bytes
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.state.lock().unwrap().dropped_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(bytes: &[u8]) -> AudioBlock {
        AudioBlock::new(bytes.to_vec())
    }

    #[test]
    fn drop_oldest_never_exceeds_capacity() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::DropOldest, 64);
        for i in 0..100u8 {
            buffer.push(block(&[i; 16]));
            assert!(buffer.buffered_bytes() <= 64);
        }
        assert_eq!(buffer.pushed_bytes(), 1600);
        assert!(buffer.dropped_bytes() > 0);
        // Most recent data survives.
        let drained = buffer.drain_all();
        assert_eq!(*drained.last().unwrap(), 99);
    }

    #[test]
    fn oversized_block_is_truncated_to_its_newest_tail() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::DropOldest, 64);
        let mut data = vec![0u8; 192];
        data.extend_from_slice(&[7u8; 64]);
        buffer.push(block(&data));

        assert_eq!(buffer.buffered_bytes(), 64);
        assert_eq!(buffer.pushed_bytes(), 256);
        assert_eq!(buffer.dropped_bytes(), 192);
        assert_eq!(buffer.drain_all(), vec![7u8; 64]);
    }

    #[test]
    fn expand_policy_loses_nothing() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::Expand, 16);
        for i in 0..100u8 {
            buffer.push(block(&[i; 16]));
        }
        assert_eq!(buffer.buffered_bytes(), 1600);
        assert_eq!(buffer.dropped_bytes(), 0);
        assert_eq!(buffer.drain_all().len(), 1600);
    }

    #[test]
    fn drain_is_oldest_first_and_splits_blocks() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::Expand, 1024);
        buffer.push(block(&[1, 1, 1, 1]));
        buffer.push(block(&[2, 2, 2, 2]));

        assert_eq!(buffer.drain(6), vec![1, 1, 1, 1, 2, 2]);
        assert_eq!(buffer.drain(6), vec![2, 2]);
        assert!(buffer.drain(6).is_empty());
    }

    #[test]
    fn discard_before_drops_warmup_blocks() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::Expand, 1024);
        let early = Instant::now();
        buffer.push(AudioBlock::with_timestamp(vec![1; 8], early));
        std::thread::sleep(Duration::from_millis(2));
        let cutoff = Instant::now();
        buffer.push(AudioBlock::with_timestamp(vec![2; 8], Instant::now()));

        assert_eq!(buffer.discard_before(cutoff), 8);
        assert_eq!(buffer.drain_all(), vec![2; 8]);
    }

    #[test]
    fn wait_for_data_times_out_and_cancels() {
        let buffer = AudioIngestBuffer::new(OverflowPolicy::DropOldest, 64);
        let cancel = AtomicBool::new(false);
        assert!(!buffer.wait_for_data(Duration::from_millis(20), &cancel));

        cancel.store(true, Ordering::Relaxed);
        let started = Instant::now();
        assert!(!buffer.wait_for_data(Duration::from_secs(5), &cancel));
        assert!(started.elapsed() < Duration::from_millis(100));

        cancel.store(false, Ordering::Relaxed);
        buffer.push(block(&[0; 4]));
        assert!(buffer.wait_for_data(Duration::from_millis(20), &cancel));
    }

    #[test]
    fn concurrent_push_and_drain_keep_arrival_order() {
        use std::sync::Arc;
        let buffer = Arc::new(AudioIngestBuffer::new(OverflowPolicy::Expand, 1024));
        let producer_buffer = buffer.clone();
        let producer = std::thread::spawn(move || {
            for i in 0..200u8 {
                producer_buffer.push(AudioBlock::new(vec![i; 4]));
            }
        });

        let mut collected = Vec::new();
        while collected.len() < 800 {
            collected.extend(buffer.drain(64));
        }
        producer.join().unwrap();

        // Every 4-byte run must be non-decreasing in producer order.
        for pair in collected.chunks(4).collect::<Vec<_>>().windows(2) {
            assert!(pair[0][0] <= pair[1][0]);
        }
    }
}
