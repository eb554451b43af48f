//! Output destinations for formatted lines.
//!
//! # Responsibilities
//! - Append lines to a size-bounded rotating file, a plain file, or a console stream
//! - Serialize concurrent writers so lines never interleave
//!
//! # Design Decisions
//! - One `Mutex` per sink; rotation runs under the same lock as writes
//! - Each line is written with a single unbuffered `write_all`
//! - A rotating sink never rotates an empty file, so an oversized first line
//!   does not produce an empty backup
//! - Without backups there is nowhere to roll over to, so the file grows

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A destination for formatted lines.
pub trait Sink: Send + Sync + fmt::Debug {
    /// Append one line. The sink adds the trailing newline.
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A writer that panicked mid-line leaves nothing we cannot overwrite.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn with_newline(line: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    buf
}

/// Path of the `index`-th backup of `path`, e.g. `homeserver.log.2`.
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

struct RotatingState {
    /// `None` after a failed reopen; the next write retries.
    file: Option<File>,
    written: u64,
}

/// A file sink bounded to `max_bytes` per file, keeping `backup_count` backups.
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    state: Mutex<RotatingState>,
}

impl RotatingFileSink {
    /// Open (or create) the active file at `path` in append mode.
    ///
    /// The parent directory must already exist and be writable.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: u32) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backup_count,
            state: Mutex::new(RotatingState {
                file: Some(file),
                written,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn should_rollover(&self, written: u64, incoming: u64) -> bool {
        self.max_bytes > 0 && self.backup_count > 0 && written > 0 && written + incoming > self.max_bytes
    }

    /// Shift backups up by one, discarding the oldest, and start a fresh file.
    fn rollover(&self, state: &mut RotatingState) -> io::Result<()> {
        // Close before renaming; required on platforms that lock open files.
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        for index in (1..self.backup_count).rev() {
            let src = backup_path(&self.path, index);
            if src.exists() {
                let dst = backup_path(&self.path, index + 1);
                if dst.exists() {
                    fs::remove_file(&dst)?;
                }
                fs::rename(&src, &dst)?;
            }
        }
        let first = backup_path(&self.path, 1);
        if first.exists() {
            fs::remove_file(&first)?;
        }
        fs::rename(&self.path, &first)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.file = Some(file);
        state.written = 0;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let buf = with_newline(line);
        let incoming = buf.len() as u64;
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        if self.should_rollover(state.written, incoming) {
            self.rollover(state)?;
        }

        if state.file.is_none() {
            let file = open_append(&self.path)?;
            state.written = file.metadata()?.len();
            state.file = Some(file);
        }
        if let Some(file) = state.file.as_mut() {
            file.write_all(&buf)?;
            state.written += incoming;
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match lock(&self.state).file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .finish()
    }
}

/// An append-only file sink without rotation.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        lock(&self.file).write_all(&with_newline(line))
    }

    fn flush(&self) -> io::Result<()> {
        lock(&self.file).flush()
    }
}

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stream {
    Stdout,
    #[default]
    Stderr,
}

/// A sink writing to stdout or stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    stream: Stream,
}

impl ConsoleSink {
    pub fn new(stream: Stream) -> Self {
        Self { stream }
    }

    pub fn stderr() -> Self {
        Self::new(Stream::Stderr)
    }

    pub fn stdout() -> Self {
        Self::new(Stream::Stdout)
    }
}

impl Sink for ConsoleSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        // The std handle locks serialize concurrent writers.
        let buf = with_newline(line);
        match self.stream {
            Stream::Stdout => io::stdout().lock().write_all(&buf),
            Stream::Stderr => io::stderr().lock().write_all(&buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream {
            Stream::Stdout => io::stdout().lock().flush(),
            Stream::Stderr => io::stderr().lock().flush(),
        }
    }
}
