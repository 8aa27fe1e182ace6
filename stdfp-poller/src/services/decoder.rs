//! External record decoder
//!
//! The decoder turns one raw measurement file into one `.csv` table per
//! record type. It writes its tables beside the raw file; they are then moved
//! into the output directory, overwriting older copies without deleting
//! anything first.

use crate::error::DecodeError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use stdfp_common::logging::targets;

#[async_trait]
pub trait RecordDecoder: Send + Sync {
    /// Decode `raw_path` into tables under `output_dir`
    async fn decode(&self, raw_path: &Path, output_dir: &Path) -> Result<(), DecodeError>;
}

/// Runs the decoder executable once per configured pass
pub struct CommandDecoder {
    program: PathBuf,
    passes: Vec<Vec<String>>,
}

impl CommandDecoder {
    pub fn new(program: PathBuf, passes: Vec<Vec<String>>) -> Self {
        Self { program, passes }
    }
}

#[async_trait]
impl RecordDecoder for CommandDecoder {
    async fn decode(&self, raw_path: &Path, output_dir: &Path) -> Result<(), DecodeError> {
        for pass in &self.passes {
            debug!(
                target: targets::CONVERSION,
                "{} {} {}",
                self.program.display(),
                raw_path.display(),
                pass.join(" ")
            );

            let status = Command::new(&self.program)
                .arg(raw_path)
                .args(pass)
                .stdout(Stdio::null())
                .status()
                .await
                .map_err(|source| DecodeError::Spawn {
                    path: raw_path.to_path_buf(),
                    source,
                })?;

            if !status.success() {
                return Err(DecodeError::Failed {
                    path: raw_path.to_path_buf(),
                    status: status.to_string(),
                });
            }
        }

        let source_dir = raw_path.parent().unwrap_or_else(|| Path::new("."));
        collect_tables(source_dir, output_dir).map_err(|source| DecodeError::Collect {
            path: raw_path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Move every `.csv` directly inside `source_dir` into `output_dir`
///
/// Returns the number of tables moved.
pub fn collect_tables(source_dir: &Path, output_dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(output_dir)?;

    let mut moved = 0;
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_table = name.to_string_lossy().to_lowercase().ends_with(".csv");
        if !is_table || !entry.file_type()?.is_file() {
            continue;
        }

        let target = output_dir.join(&name);
        if std::fs::rename(entry.path(), &target).is_err() {
            // Output directory may sit on another volume
            std::fs::copy(entry.path(), &target)?;
            std::fs::remove_file(entry.path())?;
        }
        moved += 1;
    }

    Ok(moved)
}
