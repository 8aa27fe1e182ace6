//! Composite naming, skip rules and report layout

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which report flavour a composite is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Backed by a converted raw measurement file
    Measurement,
    /// Backed by an artifact in a `CONDITION` directory
    Condition,
}

/// Skip rules and layout rules shared by the classifier and the report stage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompositeRules {
    /// Always part of the catalog; rendered directly under `Report/`
    pub summary: Vec<String>,
    /// Administrative entries that are never rendered
    pub pseudo: Vec<String>,
    /// Processing types that get no summary composites
    pub summary_excluded_types: Vec<String>,
}

impl Default for CompositeRules {
    fn default() -> Self {
        Self {
            summary: vec!["YIELD".to_string(), "TTIME".to_string()],
            pseudo: vec!["INIT".to_string(), "FLH_TOOLS".to_string()],
            summary_excluded_types: vec!["X30".to_string()],
        }
    }
}

impl CompositeRules {
    /// Summary names match by substring, as the renderer's file names do
    pub fn is_summary(&self, composite: &str) -> bool {
        self.summary.iter().any(|s| composite.contains(s.as_str()))
    }

    pub fn should_skip(&self, composite: &str, kind: ReportKind, processing_type: &str) -> bool {
        if self.pseudo.iter().any(|p| p == composite) {
            return true;
        }

        match kind {
            ReportKind::Measurement => {
                let processing_type = processing_type.to_uppercase();
                let excluded = self
                    .summary_excluded_types
                    .iter()
                    .any(|t| processing_type.contains(&t.to_uppercase()));
                excluded && self.is_summary(composite)
            }
            ReportKind::Condition => self.summary.iter().any(|s| s == composite),
        }
    }

    /// `<COMPOSITE> <FLOW> <type label>`, underscores in the composite turned into spaces
    pub fn title(composite: &str, flow: &str, type_label: &str) -> String {
        format!(
            "{} {} {}",
            composite.to_uppercase().replace('_', " "),
            flow.to_uppercase(),
            type_label
        )
    }

    /// Where the rendered HTML for `composite` is expected
    pub fn report_path(
        &self,
        report_root: &Path,
        composite: &str,
        kind: ReportKind,
        processing_type: &str,
        title: &str,
    ) -> PathBuf {
        let file_name = format!("{title}.html");
        match kind {
            ReportKind::Measurement if !self.is_summary(composite) => report_root
                .join(processing_type.to_uppercase())
                .join(file_name),
            _ => report_root.join(file_name),
        }
    }
}
