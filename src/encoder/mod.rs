pub mod args;
pub mod progress;

pub use args::{compress_args, mux_args, probe_args, segment_args, segment_pattern, EncodeSettings};
pub use progress::{parse_duration_line, parse_time_line, ProgressTracker};

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::types::RecorderEvent;

const DIAGNOSTIC_TAIL_BYTES: usize = 8 * 1024;
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
const EXIT_POLL: Duration = Duration::from_millis(10);

/// Locates the encoder executable: first beside the running application,
/// then on the search path.
pub fn locate_encoder(binary_name: &str) -> Result<PathBuf> {
    let file_name = format!("{}{}", binary_name, std::env::consts::EXE_SUFFIX);

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let beside = dir.join(&file_name);
            if beside.is_file() {
                return Ok(beside);
            }
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(RecorderError::EncoderNotFound)
}

/// Runs a probe invocation against `input` and extracts the total media
/// duration from the diagnostic output. The probe intentionally has no
/// output file, so a non-zero exit is expected and ignored.
pub fn probe_duration(executable: &Path, input: &Path) -> Result<Option<Duration>> {
    let output = Command::new(executable)
        .args(args::probe_args(input))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let duration = stderr.lines().find_map(progress::parse_duration_line);
    debug!("Probed duration of {:?}: {:?}", input, duration);
    Ok(duration)
}

/// Bridges a job's percentage stream onto the typed event channel as
/// [`RecorderEvent::EncodeProgress`]. Pass the returned sender to
/// [`EncodeJob::spawn`] or [`EncodeJob::run`].
pub fn progress_events(events: Sender<RecorderEvent>) -> Sender<u8> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        for percent in rx {
            if events.send(RecorderEvent::EncodeProgress { percent }).is_err() {
                break;
            }
        }
    });
    tx
}

/// Last few kilobytes of the encoder's diagnostic stream, kept for triage
/// when the process fails.
struct DiagnosticTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl DiagnosticTail {
    fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > DIAGNOSTIC_TAIL_BYTES {
            if let Some(evicted) = self.lines.pop_front() {
                self.bytes -= evicted.len() + 1;
            }
        }
    }

    fn render(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

struct StopState {
    requested: AtomicBool,
    killed: AtomicBool,
}

/// One external encode invocation. Argument construction happens up front
/// (see [`args`]), so a job is fully described before anything is spawned.
pub struct EncodeJob {
    executable: PathBuf,
    args: Vec<String>,
    total_duration: Option<Duration>,
    stop_grace: Duration,
}

impl EncodeJob {
    pub fn new(executable: PathBuf, args: Vec<String>) -> Self {
        Self {
            executable,
            args,
            total_duration: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Total media duration used for percentage reporting. Without it (and
    /// without a `Duration:` header in the stream) no percentages are
    /// reported.
    pub fn total_duration(mut self, total: impl Into<Option<Duration>>) -> Self {
        self.total_duration = total.into();
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Launches the process with its diagnostic stream captured line by
    /// line. Progress percentages (monotone, clamped) go to `progress` as
    /// they are parsed.
    pub fn spawn(self, progress: Option<Sender<u8>>) -> Result<EncodeJobHandle> {
        info!("Spawning encoder: {:?} {}", self.executable, self.args.join(" "));
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let tail = Arc::new(Mutex::new(DiagnosticTail::new()));

        let stderr_thread = stderr.map(|stderr| {
            let tail = tail.clone();
            let mut tracker = progress::ProgressTracker::new(self.total_duration);
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    if let Some(percent) = tracker.observe_line(&line) {
                        if let Some(progress) = &progress {
                            let _ = progress.send(percent);
                        }
                    }
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        tail.lock().unwrap().push(trimmed.to_string());
                    }
                }
            })
        });

        Ok(EncodeJobHandle {
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            stderr_thread: Some(stderr_thread.ok_or_else(|| {
                RecorderError::Generic("Encoder stderr was not captured".to_string())
            })?),
            tail,
            stop: Arc::new(StopState {
                requested: AtomicBool::new(false),
                killed: AtomicBool::new(false),
            }),
            stop_grace: self.stop_grace,
        })
    }

    /// Spawn and block until exit.
    pub fn run(self, progress: Option<Sender<u8>>) -> Result<()> {
        self.spawn(progress)?.wait()
    }
}

/// Supervises one running encode process.
pub struct EncodeJobHandle {
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    stderr_thread: Option<JoinHandle<()>>,
    tail: Arc<Mutex<DiagnosticTail>>,
    stop: Arc<StopState>,
    stop_grace: Duration,
}

/// Cloneable stop control usable from another thread while `wait` blocks.
#[derive(Clone)]
pub struct EncodeStopHandle {
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    stop: Arc<StopState>,
    stop_grace: Duration,
}

impl EncodeStopHandle {
    /// Cooperative stop: writes the quit command to the process input, waits
    /// out the grace period, then force-terminates. Only the first caller
    /// runs the sequence. Escalation to kill is a warning, not a failure.
    pub fn request_stop(&self) {
        if self.stop.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Requesting cooperative encoder stop");
        if let Some(mut stdin) = self.stdin.lock().unwrap().take() {
            let _ = stdin.write_all(b"q\n");
            let _ = stdin.flush();
            // Dropping stdin closes the pipe, which is itself a quit signal.
        }

        let deadline = Instant::now() + self.stop_grace;
        loop {
            if let Ok(Some(_)) = self.child.lock().unwrap().try_wait() {
                return;
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(EXIT_POLL);
        }

        warn!(
            "{}",
            RecorderError::StopTimeout(self.stop_grace)
        );
        self.stop.killed.store(true, Ordering::SeqCst);
        if let Err(e) = self.child.lock().unwrap().kill() {
            warn!("Failed to kill encoder process: {}", e);
        }
    }
}

impl EncodeJobHandle {
    pub fn stopper(&self) -> EncodeStopHandle {
        EncodeStopHandle {
            child: self.child.clone(),
            stdin: self.stdin.clone(),
            stop: self.stop.clone(),
            stop_grace: self.stop_grace,
        }
    }

    pub fn request_stop(&self) {
        self.stopper().request_stop();
    }

    /// Blocks until the process exits and diagnostics are collected.
    /// Success is exit code 0; failure carries the diagnostic tail. A
    /// process killed by our own stop escalation counts as stopped, not
    /// failed.
    pub fn wait(mut self) -> Result<()> {
        let status = loop {
            match self.child.lock().unwrap().try_wait()? {
                Some(status) => break status,
                None => std::thread::sleep(EXIT_POLL),
            }
        };

        if let Some(thread) = self.stderr_thread.take() {
            let _ = thread.join();
        }

        if status.success() {
            info!("Encoder finished successfully");
            return Ok(());
        }
        if self.stop.killed.load(Ordering::SeqCst) {
            warn!("Encoder was force-terminated after the stop grace period");
            return Ok(());
        }

        let tail = self.tail.lock().unwrap().render();
        Err(RecorderError::EncoderProcessFailure {
            exit_code: status.code().unwrap_or(-1),
            diagnostic_tail: tail,
        })
    }
}
