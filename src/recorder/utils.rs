use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Directory name identifying one recording session by its start timestamp,
/// e.g. `Recording_2026-08-30_14-05-09`.
pub fn session_dir_name(started_at: DateTime<Local>) -> String {
    format!("Recording_{}", started_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Creates and returns a fresh session directory under `base`.
pub fn create_session_dir(base: &Path) -> std::io::Result<PathBuf> {
    let dir = base.join(session_dir_name(Local::now()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
