use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::error::RecorderError;
use crate::pacing::FramePacer;
use crate::types::VideoFrame;

use super::source::FrameSource;

/// Pacer-gated frame acquisition loop. Runs on its own thread so the frame
/// cadence is isolated from control-thread scheduling jitter.
///
/// A grab failure is not a crash: the error is parked in `failure`, the
/// shared cancel flag is raised, and finalization proceeds as if Stop had
/// been requested. Returns the number of frames sent.
pub fn collect_frames(
    mut source: Box<dyn FrameSource>,
    send: Sender<VideoFrame>,
    cancel: Arc<AtomicBool>,
    pacer: FramePacer,
    failure: Arc<Mutex<Option<RecorderError>>>,
) -> u64 {
    let config = source.video_config();
    info!(
        "Frame collection started: {}x{} @ {}/{} fps",
        config.width, config.height, config.fps_num, config.fps_den
    );

    let mut frame_count: u64 = 0;
    loop {
        if !pacer.wait_for_frame(frame_count, &cancel) {
            break;
        }

        let data = match source.grab_frame() {
            Ok(data) => data,
            Err(e) => {
                error!("Frame grab failed, requesting implicit stop: {}", e);
                *failure.lock().unwrap() = Some(e);
                cancel.store(true, Ordering::Relaxed);
                break;
            }
        };

        if send
            .send(VideoFrame {
                index: frame_count,
                data,
            })
            .is_err()
        {
            debug!("Frame channel closed, stopping collection");
            break;
        }
        frame_count += 1;

        if frame_count % 100 == 0 {
            let behind = pacer
                .due_frame_index(pacer.elapsed())
                .saturating_sub(frame_count);
            debug!("Collected {} frames ({} behind schedule)", frame_count, behind);
        }
    }

    info!("Frame collection finished after {} frames", frame_count);
    frame_count
}
