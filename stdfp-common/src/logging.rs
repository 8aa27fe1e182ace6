//! Tracing setup with one line-bounded log file per pipeline stage
//!
//! Console output carries live progress; each stage (polling, conversion,
//! report, condition) additionally gets its own file, selected by `tracing`
//! target and rotated after a fixed number of lines.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// `tracing` targets naming each stage log
pub mod targets {
    pub const POLLING: &str = "polling";
    pub const CONVERSION: &str = "conversion";
    pub const REPORT: &str = "report";
    pub const CONDITION: &str = "condition";

    pub const ALL: [&str; 4] = [POLLING, CONVERSION, REPORT, CONDITION];

    /// Live discovery progress; console only
    pub const PROGRESS: &str = "progress";
}

struct RotationState {
    file: Option<File>,
    lines: usize,
}

/// Append-only log file that rotates once it holds `max_lines` lines.
///
/// Rotation shifts `name.1` to `name.2` and so on up to `backup_count`, moves
/// the live file to `name.1` and starts a fresh one. The line count of an
/// existing file is read at open so limits hold across restarts.
pub struct LineRotatingFile {
    path: PathBuf,
    max_lines: usize,
    backup_count: usize,
    state: Mutex<RotationState>,
}

impl LineRotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_lines: usize, backup_count: usize) -> io::Result<Self> {
        let path = path.into();
        let lines = count_lines(&path)?;
        let file = open_append(&path)?;

        Ok(Self {
            path,
            max_lines,
            backup_count,
            state: Mutex::new(RotationState {
                file: Some(file),
                lines,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines in the live file
    pub fn line_count(&self) -> usize {
        self.lock().lines
    }

    fn lock(&self) -> MutexGuard<'_, RotationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&self, state: &mut RotationState) -> io::Result<()> {
        // Close before renaming; Windows refuses to move open files
        state.file = None;

        if self.backup_count > 0 {
            for index in (1..self.backup_count).rev() {
                let source = self.backup_path(index);
                if source.exists() {
                    std::fs::rename(&source, self.backup_path(index + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
            state.file = Some(open_append(&self.path)?);
        } else {
            state.file = Some(File::create(&self.path)?);
        }

        state.lines = 0;
        Ok(())
    }
}

/// Writer handed out per event; holds the file lock for the whole event
pub struct LineRotatingWriter<'a> {
    guard: MutexGuard<'a, RotationState>,
}

impl Write for LineRotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .guard
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.guard.lines += buf[..written].iter().filter(|b| **b == b'\n').count();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.guard.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LineRotatingFile {
    type Writer = LineRotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let mut guard = self.lock();
        if self.max_lines > 0 && guard.lines >= self.max_lines {
            if let Err(e) = self.rotate(&mut guard) {
                eprintln!("log rotation failed for {}: {}", self.path.display(), e);
                if guard.file.is_none() {
                    guard.file = open_append(&self.path).ok();
                }
            }
        }
        LineRotatingWriter { guard }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn count_lines(path: &Path) -> io::Result<usize> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file).lines().count()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Run `f` with a stderr-only subscriber, for work done before
/// [`init_logging`] has the configuration it needs
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(console_filter)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Install the global subscriber: console layer plus one file layer per stage.
///
/// `RUST_LOG` overrides the console level; stage files always use the
/// configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;

    let file_level = LevelFilter::from_str(&config.level)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(
        fmt::layer()
            .with_target(false)
            .with_filter(console_filter)
            .boxed(),
    );

    for stage in targets::ALL {
        let file = LineRotatingFile::open(
            config.directory.join(format!("{stage}.log")),
            config.max_lines,
            config.backup_count,
        )?;
        layers.push(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(false)
                .with_filter(Targets::new().with_target(stage, file_level))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
