use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Maximum single sleep slice inside the pacing wait. Short slices keep the
/// cancellation flag responsive while `spin_sleep` keeps the final approach
/// accurate well below OS scheduler granularity.
const WAIT_SLICE: Duration = Duration::from_micros(500);

/// Computes when each video frame is due relative to the session start.
///
/// Every schedule is an absolute offset from the start instant, never
/// "now + 1/fps". Slow frame grabs therefore cause a catch-up burst instead
/// of pushing the whole timeline back one frame at a time.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    start: Instant,
    fps_num: u32,
    fps_den: u32,
}

impl FramePacer {
    pub fn new(fps_num: u32, fps_den: u32) -> Self {
        Self::with_start(Instant::now(), fps_num, fps_den)
    }

    pub fn with_start(start: Instant, fps_num: u32, fps_den: u32) -> Self {
        assert!(fps_num > 0 && fps_den > 0, "frame rate must be positive");
        Self {
            start,
            fps_num,
            fps_den,
        }
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Number of frames that should have been emitted after `elapsed` time:
    /// `floor(elapsed * fps)`.
    pub fn due_frame_index(&self, elapsed: Duration) -> u64 {
        let ticks = elapsed.as_nanos() * self.fps_num as u128;
        (ticks / (1_000_000_000u128 * self.fps_den as u128)) as u64
    }

    /// Absolute offset from the start instant at which frame `index` is due.
    pub fn due_time(&self, index: u64) -> Duration {
        let nanos = index as u128 * 1_000_000_000u128 * self.fps_den as u128 / self.fps_num as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Blocks until frame `index` is due, re-checking `cancel` at
    /// sub-millisecond granularity. Returns false if cancelled first.
    pub fn wait_for_frame(&self, index: u64, cancel: &AtomicBool) -> bool {
        let target = self.start + self.due_time(index);
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= target {
                return true;
            }
            spin_sleep::sleep((target - now).min(WAIT_SLICE));
        }
    }
}
