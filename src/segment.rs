use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::encoder::{self, EncodeJob, EncodeSettings};
use crate::error::{RecorderError, Result};
use crate::recorder::Recorder;
use crate::types::RecorderEvent;

const ROTATION_POLL: Duration = Duration::from_millis(2);

/// How fixed-length output rotation is achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStrategy {
    /// One encode job over an already captured source; the external tool
    /// rotates files itself. Frame-accurate splits.
    Delegated,
    /// Stop and immediately restart capture sub-sessions on a timer.
    Rotate,
}

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub interval: Duration,
    pub basename: String,
    pub extension: String,
    pub strategy: SegmentStrategy,
    /// Independent overall recording limit; composes with rotation through
    /// the shared cancellation authority.
    pub stop_after: Option<Duration>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            basename: "Part".to_string(),
            extension: "mp4".to_string(),
            strategy: SegmentStrategy::Delegated,
            stop_after: None,
        }
    }
}

/// Number of segments a recording of `total` length splits into at the
/// given rotation interval.
pub fn segment_count(total: Duration, interval: Duration) -> u32 {
    if total.is_zero() || interval.is_zero() {
        return 0;
    }
    total.as_secs_f64().div_euclid(interval.as_secs_f64()) as u32
        + if total.as_secs_f64() % interval.as_secs_f64() > 0.0 { 1 } else { 0 }
}

/// Numbered output path for segment `index` (1-indexed): `Part_001.mp4`.
pub fn segment_path(dir: &Path, basename: &str, index: u32, extension: &str) -> PathBuf {
    dir.join(format!("{basename}_{index:03}.{extension}"))
}

fn emit(events: &Option<Sender<RecorderEvent>>, event: RecorderEvent) {
    if let Some(events) = events {
        let _ = events.send(event);
    }
}

/// Delegated segmentation: one encode job over `input`, with the segment
/// muxer writing the numbered parts. Returns the produced paths in order.
pub fn run_delegated(
    executable: &Path,
    input: &Path,
    output_dir: &Path,
    config: &SegmentConfig,
    settings: &EncodeSettings,
    progress: Option<Sender<u8>>,
) -> Result<Vec<PathBuf>> {
    let total = encoder::probe_duration(executable, input)?;
    let pattern = encoder::segment_pattern(output_dir, &config.basename, &config.extension);
    info!(
        "Delegated segmentation of {:?} into {:?} every {:?} (total {:?})",
        input, pattern, config.interval, total
    );

    EncodeJob::new(
        executable.to_path_buf(),
        encoder::segment_args(input, &pattern, config.interval, settings),
    )
    .total_duration(total)
    .run(progress)?;

    let produced = list_segments(output_dir, &config.basename, &config.extension)?;
    if let Some(total) = total {
        let expected = segment_count(total, config.interval);
        if produced.len() as u32 != expected {
            warn!(
                "Expected {} segments for a {:?} recording, found {}",
                expected,
                total,
                produced.len()
            );
        }
    }
    Ok(produced)
}

/// Existing numbered segments under `dir`, sorted by index.
pub fn list_segments(dir: &Path, basename: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{basename}_");
    let suffix = format!(".{extension}");
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(&suffix))
        })
        .collect();
    found.sort();
    Ok(found)
}

enum BoundaryOutcome {
    Rotate,
    Finished,
}

fn wait_for_boundary(
    boundary: Instant,
    deadline: Option<Instant>,
    cancel: &AtomicBool,
) -> BoundaryOutcome {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return BoundaryOutcome::Finished;
        }
        let now = Instant::now();
        if let Some(deadline) = deadline {
            if now >= deadline {
                return BoundaryOutcome::Finished;
            }
        }
        if now >= boundary {
            return BoundaryOutcome::Rotate;
        }
        std::thread::sleep(ROTATION_POLL);
    }
}

/// Application-level rotation: a fresh capture sub-session per segment,
/// restarted at every interval boundary. Boundaries are absolute offsets
/// from the overall start, so stop/start latency does not accumulate across
/// segments, and the successor sub-session is started before the finished
/// one is finalized so rotation never leaves a capture gap.
///
/// `start_segment` is called with the 1-indexed segment number and its
/// output path and must return an already started [`Recorder`]. Sub-session
/// configs should carry zero warm-up; warm-up alignment belongs to the
/// overall session start, not to each part. A raised `cancel` flag (manual
/// stop) and the optional `stop_after` limit both end the run through the
/// same path; each sub-session still finalizes exactly once because
/// `Recorder::stop` is idempotent.
pub fn run_rotating<F>(
    output_dir: &Path,
    config: &SegmentConfig,
    cancel: Arc<AtomicBool>,
    events: Option<Sender<RecorderEvent>>,
    mut start_segment: F,
) -> Result<Vec<PathBuf>>
where
    F: FnMut(u32, &Path) -> Result<Recorder>,
{
    let overall_start = Instant::now();
    let deadline = config.stop_after.map(|limit| overall_start + limit);
    let mut produced = Vec::new();
    let mut index: u32 = 1;

    let mut path = segment_path(output_dir, &config.basename, index, &config.extension);
    let mut active = start_segment(index, &path)?;
    emit(&events, RecorderEvent::SegmentOpened {
        index,
        path: path.clone(),
    });
    produced.push(path.clone());

    loop {
        let boundary = overall_start + config.interval * index;
        match wait_for_boundary(boundary, deadline, &cancel) {
            BoundaryOutcome::Rotate => {
                let next_index = index + 1;
                let next_path =
                    segment_path(output_dir, &config.basename, next_index, &config.extension);
                // Successor first: the old part keeps capturing until the
                // new one is live, trading a brief overlap for a zero gap.
                let next = match start_segment(next_index, &next_path) {
                    Ok(next) => next,
                    Err(e) => {
                        finish_segment(active, index, path, &events)?;
                        return Err(e);
                    }
                };
                finish_segment(active, index, path, &events)?;

                emit(&events, RecorderEvent::SegmentOpened {
                    index: next_index,
                    path: next_path.clone(),
                });
                produced.push(next_path.clone());
                active = next;
                index = next_index;
                path = next_path;
            }
            BoundaryOutcome::Finished => {
                finish_segment(active, index, path, &events)?;
                break;
            }
        }
    }

    info!("Rotation finished with {} segments", produced.len());
    Ok(produced)
}

fn finish_segment(
    recorder: Recorder,
    index: u32,
    path: PathBuf,
    events: &Option<Sender<RecorderEvent>>,
) -> Result<()> {
    let stop_result = recorder.stop();
    emit(events, RecorderEvent::SegmentClosed { index, path });
    if let Err(e) = stop_result {
        // Keep the parts already written; surface the failure.
        warn!("Segment {} failed to finalize cleanly: {}", index, e);
        return Err(e);
    }
    Ok(())
}

/// Two-pass post-capture pipeline: mux the captured elementary streams into
/// one synced container, then hand that file to the delegated segmenter.
/// The intermediate file is left in `work_dir` next to the parts.
pub fn mux_and_split(
    executable: &Path,
    video_in: &Path,
    audio_in: &Path,
    work_dir: &Path,
    config: &SegmentConfig,
    settings: &EncodeSettings,
    progress: Option<Sender<u8>>,
) -> Result<Vec<PathBuf>> {
    let synced = work_dir.join(format!("synced.{}", config.extension));
    info!("Muxing {:?} + {:?} into {:?}", video_in, audio_in, synced);
    EncodeJob::new(
        executable.to_path_buf(),
        encoder::mux_args(video_in, audio_in, &synced, settings),
    )
    .run(None)?;

    run_delegated(executable, &synced, work_dir, config, settings, progress)
}

/// Convenience dispatcher for a post-capture split on either strategy.
/// `Rotate` cannot be applied retroactively to a finished capture, so it
/// falls back to the delegated path.
pub fn split_recording(
    executable: &Path,
    input: &Path,
    output_dir: &Path,
    config: &SegmentConfig,
    settings: &EncodeSettings,
    progress: Option<Sender<u8>>,
) -> Result<Vec<PathBuf>> {
    match config.strategy {
        SegmentStrategy::Delegated => {
            run_delegated(executable, input, output_dir, config, settings, progress)
        }
        SegmentStrategy::Rotate => Err(RecorderError::Generic(
            "application-level rotation applies to live capture, not finished files".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_matches_rotation_interval() {
        // 300s at 120s rotation: two full parts and one 60s remainder.
        assert_eq!(
            segment_count(Duration::from_secs(300), Duration::from_secs(120)),
            3
        );
        assert_eq!(
            segment_count(Duration::from_secs(240), Duration::from_secs(120)),
            2
        );
        assert_eq!(
            segment_count(Duration::from_secs(1), Duration::from_secs(120)),
            1
        );
        assert_eq!(segment_count(Duration::ZERO, Duration::from_secs(120)), 0);
    }

    #[test]
    fn segment_paths_are_one_indexed_and_padded() {
        let path = segment_path(Path::new("/out"), "Part", 7, "mp4");
        assert_eq!(path, PathBuf::from("/out/Part_007.mp4"));
        let path = segment_path(Path::new("/out"), "Part", 123, "mp4");
        assert_eq!(path, PathBuf::from("/out/Part_123.mp4"));
    }

    #[test]
    fn boundary_wait_honors_cancel_and_deadline() {
        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = wait_for_boundary(Instant::now() + Duration::from_secs(60), None, &cancel);
        assert!(matches!(outcome, BoundaryOutcome::Finished));

        let cancel = Arc::new(AtomicBool::new(false));
        let now = Instant::now();
        let outcome = wait_for_boundary(
            now + Duration::from_secs(60),
            Some(now + Duration::from_millis(20)),
            &cancel,
        );
        assert!(matches!(outcome, BoundaryOutcome::Finished));

        let outcome = wait_for_boundary(
            Instant::now() + Duration::from_millis(20),
            None,
            &cancel,
        );
        assert!(matches!(outcome, BoundaryOutcome::Rotate));
    }
}
