//! In-test collaborators that record their invocations

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use stdfp_poller::error::{DecodeError, RenderError};
use stdfp_poller::services::{RecordDecoder, RenderRequest, ReportRenderer};

/// Writes `tables` csv files per raw file, or fails for listed names
pub struct FakeDecoder {
    tables: usize,
    failing: Vec<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeDecoder {
    pub fn new(tables: usize) -> Self {
        Self {
            tables,
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, raw_name: &str) -> Self {
        self.failing.push(raw_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordDecoder for FakeDecoder {
    async fn decode(&self, raw_path: &Path, output_dir: &Path) -> Result<(), DecodeError> {
        self.calls.lock().unwrap().push(raw_path.to_path_buf());

        let name = raw_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(DecodeError::Failed {
                path: raw_path.to_path_buf(),
                status: "exit status: 1".to_string(),
            });
        }

        fs::create_dir_all(output_dir).unwrap();
        for i in 0..self.tables {
            fs::write(output_dir.join(format!("{name}.t{i}.csv")), "A,B\n1,2\n").unwrap();
        }
        Ok(())
    }
}

/// Writes the requested HTML, or fails for listed composites
#[derive(Default)]
pub struct FakeRenderer {
    failing: Vec<String>,
    /// Report success without writing anything
    silent: Vec<String>,
    calls: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, composite: &str) -> Self {
        self.failing.push(composite.to_string());
        self
    }

    pub fn silent_for(mut self, composite: &str) -> Self {
        self.silent.push(composite.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RenderRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rendered_composites(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|r| r.composite().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ReportRenderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
        self.calls.lock().unwrap().push(request.clone());

        if self.failing.iter().any(|c| c == request.composite()) {
            return Err(RenderError::Failed {
                composite: request.composite().to_string(),
                status: "exit status: 1".to_string(),
            });
        }

        if self.silent.iter().any(|c| c == request.composite()) {
            return Ok(());
        }

        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&request.output, "<html></html>").unwrap();
        Ok(())
    }
}
