//! Size-capped rotating file writer: `path`, `path.1`, … `path.{N-1}`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default size cap per generation (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Default number of retained generations.
pub const DEFAULT_GENERATIONS: usize = 5;

/// Appends lines to `path`, rotating to numbered backups when the current
/// file exceeds `max_bytes`.
pub struct RotatingWriter {
    base_path: PathBuf,
    max_bytes: u64,
    generations: usize,
    current_size: u64,
    file: File,
}

impl RotatingWriter {
    /// Open (or create) the rotating writer at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        Self::with_limits(base_path, DEFAULT_MAX_BYTES, DEFAULT_GENERATIONS)
    }

    /// Open with explicit size and generation limits, mainly for tests.
    pub fn with_limits(
        base_path: impl Into<PathBuf>,
        max_bytes: u64,
        generations: usize,
    ) -> std::io::Result<Self> {
        let base_path = base_path.into();
        if let Some(parent) = base_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&base_path)?;
        let current_size = file.metadata()?.len();
        Ok(Self {
            base_path,
            max_bytes,
            generations,
            current_size,
            file,
        })
    }

    /// Append one line, rotating first if the write would exceed the cap.
    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let line_len = line.len() as u64 + 1;
        if self.current_size + line_len > self.max_bytes && self.current_size > 0 {
            self.rotate()?;
        }
        writeln!(self.file, "{line}")?;
        self.current_size += line_len;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        for gen in (1..self.generations).rev() {
            let from = self.generation_path(gen);
            let to = self.generation_path(gen + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        let first_backup = self.generation_path(1);
        std::fs::rename(&self.base_path, &first_backup)?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)?;
        self.current_size = 0;
        Ok(())
    }

    fn generation_path(&self, gen: usize) -> PathBuf {
        let mut name = self.base_path.clone().into_os_string();
        name.push(format!(".{gen}"));
        PathBuf::from(name)
    }

    /// Path of the active (generation 0) file.
    #[must_use]
    pub fn active_path(&self) -> &Path {
        &self.base_path
    }
}
