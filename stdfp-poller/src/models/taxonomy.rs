//! Positions in the directory taxonomy and the work items derived from them

use std::path::{Path, PathBuf};

/// Corner label used when the wafer/badge directory carries none
pub const DEFAULT_CORNER: &str = "TTTT";

/// How a flow directory is organised below itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// `<flow>/<lot>/<lot>_<NN>/...`
    Wafer,
    /// `<flow>/<package>/<badge>/...`
    Package,
}

/// Attributes parsed from a leaf directory's position in the taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyPosition {
    pub product: String,
    pub product_cut: String,
    pub flow: String,
    pub flow_kind: FlowKind,
    /// Lot directory (wafer flows) or package directory (package flows)
    pub lot: String,
    /// Wafer directory (`<lot>_<NN>`) or badge directory
    pub unit: String,
    /// Leaf subfolder name, e.g. `VOLUME` or `x30`
    pub processing_type: String,
}

impl TaxonomyPosition {
    /// Wafer number for wafer flows, badge name for package flows
    pub fn wafer(&self) -> &str {
        match self.flow_kind {
            FlowKind::Wafer => match self.wafer_suffix() {
                Some(rest) => rest.split('_').next().unwrap_or(rest),
                None => self.unit.split('_').nth(1).unwrap_or(self.unit.as_str()),
            },
            FlowKind::Package => self.unit.as_str(),
        }
    }

    /// Component after the wafer number (wafer flows) or the third
    /// `_`-separated component of the badge (package flows), if any
    pub fn corner(&self) -> &str {
        let corner = match (self.flow_kind, self.wafer_suffix()) {
            (FlowKind::Wafer, Some(rest)) => rest.splitn(2, '_').nth(1),
            _ => self.unit.splitn(3, '_').nth(2),
        };
        corner.unwrap_or(DEFAULT_CORNER)
    }

    /// Unit directory with its `<lot>_` prefix removed
    fn wafer_suffix(&self) -> Option<&str> {
        self.unit
            .strip_prefix(self.lot.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
    }

    /// Short human-readable label for log lines
    pub fn label(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.product.to_uppercase(),
            self.flow.to_uppercase(),
            self.lot.to_uppercase(),
            self.wafer(),
            self.processing_type
        )
    }
}

/// Bottom-level directory expected to hold exactly one raw measurement file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafDirectory {
    pub path: PathBuf,
    pub position: TaxonomyPosition,
}

/// `CONDITION` directory found directly under a flow directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionDirectory {
    pub path: PathBuf,
    pub product: String,
    pub product_cut: String,
    pub flow: String,
}

/// One element of a taxonomy walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyEntry {
    Leaf(LeafDirectory),
    Condition(ConditionDirectory),
}

/// One raw measurement file and everything derived from where it sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub raw_path: PathBuf,
    pub raw_name: String,
    pub position: TaxonomyPosition,
}

impl WorkItem {
    pub fn new(leaf: &LeafDirectory, raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        Self {
            raw_path: leaf.path.join(&raw_name),
            raw_name,
            position: leaf.position.clone(),
        }
    }

    pub fn leaf_dir(&self) -> &Path {
        self.raw_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Directory the decoder's tables land in
    pub fn output_dir(&self, output_dir_name: &str) -> PathBuf {
        self.leaf_dir().join(output_dir_name)
    }

    /// Common prefix of the decoder's tables: `<output>/<raw name>`
    pub fn tables_base(&self, output_dir_name: &str) -> PathBuf {
        self.output_dir(output_dir_name).join(&self.raw_name)
    }

    pub fn report_root(&self, report_dir_name: &str) -> PathBuf {
        self.leaf_dir().join(report_dir_name)
    }
}

/// One artifact dropped into a `CONDITION` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionItem {
    pub artifact: PathBuf,
    pub product: String,
    pub product_cut: String,
    pub flow: String,
}

impl ConditionItem {
    pub fn new(dir: &ConditionDirectory, file_name: &str) -> Self {
        Self {
            artifact: dir.path.join(file_name),
            product: dir.product.clone(),
            product_cut: dir.product_cut.clone(),
            flow: dir.flow.clone(),
        }
    }

    pub fn condition_dir(&self) -> &Path {
        self.artifact.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn file_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Unit of work consumed by the report stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportJob {
    Measurement(WorkItem),
    Condition(ConditionItem),
}

impl ReportJob {
    /// Path identifying the job for deduplication
    pub fn key(&self) -> &Path {
        match self {
            ReportJob::Measurement(item) => &item.raw_path,
            ReportJob::Condition(item) => &item.artifact,
        }
    }
}
