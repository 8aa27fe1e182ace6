//! External report renderer
//!
//! `NotebookRenderer` executes the processing type's notebook with
//! `jupyter nbconvert`, handing it the serialized parameter bag through a JSON
//! file named by `STDFP_REPORT_CONFIG`.

use crate::config::ReportSettings;
use crate::error::RenderError;
use crate::models::CompositeParameter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use stdfp_common::logging::targets;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the parameter bag path to the notebook
pub const REPORT_CONFIG_ENV_VAR: &str = "STDFP_REPORT_CONFIG";

/// One composite to render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub parameter: CompositeParameter,
    /// Final HTML path
    pub output: PathBuf,
    /// Tables the composite reads
    pub inputs: Vec<PathBuf>,
}

impl RenderRequest {
    pub fn composite(&self) -> &str {
        &self.parameter.composite
    }
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Produce the HTML at `request.output`
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError>;
}

pub struct NotebookRenderer {
    program: PathBuf,
    args: Vec<String>,
    notebook_dir: PathBuf,
}

impl NotebookRenderer {
    pub fn new(program: PathBuf, args: Vec<String>, notebook_dir: PathBuf) -> Self {
        Self {
            program,
            args,
            notebook_dir,
        }
    }

    pub fn from_settings(settings: &ReportSettings) -> Self {
        Self::new(
            settings.program.clone(),
            settings.args.clone(),
            settings.notebook_dir.clone(),
        )
    }

    pub fn notebook(&self, processing_type: &str) -> PathBuf {
        self.notebook_dir
            .join(format!("{}.ipynb", processing_type.to_uppercase()))
    }

    /// Argument list with `{output}` and `{notebook}` substituted
    ///
    /// nbconvert appends `.html` itself, so `{output}` has no extension.
    pub fn args_for(&self, output: &Path, notebook: &Path) -> Vec<String> {
        let output = output.with_extension("");
        self.args
            .iter()
            .map(|a| {
                a.replace("{output}", &output.to_string_lossy())
                    .replace("{notebook}", &notebook.to_string_lossy())
            })
            .collect()
    }

    fn config_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!(".{stem}.json"))
    }
}

#[async_trait]
impl ReportRenderer for NotebookRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
        let composite = request.composite().to_string();
        let prepare = |reason: String| RenderError::Prepare {
            composite: composite.clone(),
            reason,
        };

        if let Some(dir) = request.output.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| prepare(format!("{}: {}", dir.display(), e)))?;
        }

        let config_path = Self::config_path(&request.output);
        let json = serde_json::to_vec_pretty(&request.parameter).map_err(|e| prepare(e.to_string()))?;
        std::fs::write(&config_path, json)
            .map_err(|e| prepare(format!("{}: {}", config_path.display(), e)))?;

        let notebook = self.notebook(&request.parameter.processing_type);
        let args = self.args_for(&request.output, &notebook);
        debug!(target: targets::REPORT, "{} {}", self.program.display(), args.join(" "));

        let status = Command::new(&self.program)
            .args(&args)
            .env(REPORT_CONFIG_ENV_VAR, &config_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let _ = std::fs::remove_file(&config_path);

        let status = status.map_err(|source| RenderError::Spawn {
            composite: composite.clone(),
            source,
        })?;
        if !status.success() {
            return Err(RenderError::Failed {
                composite,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_substitution() {
        let renderer = NotebookRenderer::from_settings(&ReportSettings::default());
        let output = Path::new("/leaf/Report/VOLUME/LEAKAGE EWS1 volume.html");
        let notebook = renderer.notebook("volume");

        assert_eq!(notebook, Path::new("jupiter").join("VOLUME.ipynb"));

        let args = renderer.args_for(output, &notebook);
        assert_eq!(args[0], "nbconvert");
        assert!(args.contains(&"/leaf/Report/VOLUME/LEAKAGE EWS1 volume".to_string()));
        assert_eq!(args.last().unwrap(), &notebook.to_string_lossy().into_owned());
    }

    #[test]
    fn test_config_path_is_hidden_sibling() {
        let output = Path::new("/leaf/Report/YIELD EWS1 volume.html");
        assert_eq!(
            NotebookRenderer::config_path(output),
            Path::new("/leaf/Report/.YIELD EWS1 volume.json")
        );
    }
}
