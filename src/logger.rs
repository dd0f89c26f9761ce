use chrono::Local;
use env_logger::{Builder, Target};
use lazy_static::lazy_static;
use log::{error, info, LevelFilter};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

lazy_static! {
    static ref INIT_GUARD: Mutex<bool> = Mutex::new(false);
    static ref SINK: Mutex<Option<LogSink>> = Mutex::new(None);
}

/// Logging setup for the library and its demo binary. Output always goes to
/// stdout; a log directory adds a timestamped session log file next to it.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    enabled: bool,
    log_dir: Option<PathBuf>,
    log_level: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: None,
            log_level: LevelFilter::Debug,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn disable_logging(mut self) -> Self {
        self.enabled = false;
        self
    }
}

struct LogSink {
    file: Option<File>,
    stdout: bool,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        if let Some(file) = &mut self.file {
            if let Ok(n) = file.write(buf) {
                written = n;
            }
        }
        if self.stdout {
            if let Ok(n) = io::stdout().lock().write(buf) {
                written = written.max(n);
            }
        }
        if written > 0 {
            Ok(written)
        } else {
            Err(io::Error::new(io::ErrorKind::Other, "no log output accepted the write"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        if self.stdout {
            io::stdout().flush()?;
        }
        Ok(())
    }
}

struct SinkProxy;

impl Write for SinkProxy {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *SINK.lock().unwrap() {
            Some(sink) => sink.write(buf),
            None => Ok(0),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *SINK.lock().unwrap() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

/// Initializes the global logger once. A second call is an error unless
/// logging is disabled.
pub fn setup_logger(config: LoggerConfig) -> io::Result<()> {
    let mut initialized = INIT_GUARD.lock().unwrap();
    if *initialized {
        if !config.enabled {
            return Ok(());
        }
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "logger already initialized",
        ));
    }

    if !config.enabled {
        *initialized = true;
        return Ok(());
    }

    let file = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
            Some(File::create(log_dir.join(format!("screenrec_log_{timestamp}.txt")))?)
        }
        None => None,
    };

    *SINK.lock().unwrap() = Some(LogSink { file, stdout: true });

    let mut builder = Builder::new();
    builder
        .filter_level(config.log_level)
        .target(Target::Pipe(Box::new(SinkProxy)))
        .format(|buf, record| {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(buf, "{} [{}] - {}", timestamp, record.level(), record.args())
        });
    builder
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    // A panicking capture thread should still leave its last words in the
    // session log.
    std::panic::set_hook(Box::new(|panic_info| {
        error!("PANIC: {}", panic_info);
        if let Some(location) = panic_info.location() {
            error!("PANIC occurred in file '{}' at line {}", location.file(), location.line());
        }
        if let Some(sink) = &mut *SINK.lock().unwrap() {
            let _ = sink.flush();
        }
    }));

    *initialized = true;
    info!("Logger initialized");
    Ok(())
}
