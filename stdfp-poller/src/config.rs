//! Poller settings
//!
//! One TOML document drives the whole service. Every section is optional;
//! missing keys take the built-in defaults below, which mirror the layout of
//! the production file store.

use crate::models::CompositeRules;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stdfp_common::config::{load_toml_config, LoggingConfig};
use stdfp_common::time::secs_to_duration;
use stdfp_common::{Error, Result};

/// Complete poller configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the taxonomy; resolved together with CLI and environment
    pub watch_root: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub schedule: ScheduleSettings,
    pub taxonomy: TaxonomySettings,
    pub conversion: ConversionSettings,
    pub report: ReportSettings,
    pub catalog: CatalogSettings,
}

impl Settings {
    /// Load settings from `path` (or defaults when `None`) and validate them
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings: Settings = load_toml_config(path)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.conversion_workers == 0 || self.schedule.report_workers == 0 {
            return Err(Error::Config(
                "schedule.conversion_workers and schedule.report_workers must be at least 1"
                    .to_string(),
            ));
        }
        if self.schedule.queue_capacity == 0 {
            return Err(Error::Config("schedule.queue_capacity must be at least 1".to_string()));
        }
        if self.taxonomy.subfolders.is_empty() {
            return Err(Error::Config("taxonomy.subfolders must not be empty".to_string()));
        }
        if self.taxonomy.raw_extensions.is_empty() {
            return Err(Error::Config("taxonomy.raw_extensions must not be empty".to_string()));
        }
        if self.conversion.passes.is_empty() {
            return Err(Error::Config("conversion.passes must list at least one pass".to_string()));
        }
        if let Some(template) = &self.catalog.url_template {
            if !template.contains("{cut}") || !template.contains("{flow}") {
                return Err(Error::Config(format!(
                    "catalog.url_template must contain {{cut}} and {{flow}}: {template}"
                )));
            }
        }
        Ok(())
    }
}

/// Discovery cadence and worker pool sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Pause between the end of one discovery pass and the start of the next
    pub poll_interval_secs: u64,
    /// Bound of each work queue; discovery blocks while a queue is full
    pub queue_capacity: usize,
    /// Worker queue read timeout; expiry only logs idleness
    pub queue_read_timeout_secs: u64,
    pub conversion_workers: usize,
    pub report_workers: usize,
}

impl ScheduleSettings {
    pub fn poll_interval(&self) -> Duration {
        secs_to_duration(self.poll_interval_secs)
    }

    pub fn queue_read_timeout(&self) -> Duration {
        secs_to_duration(self.queue_read_timeout_secs)
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 600,
            queue_capacity: 256,
            queue_read_timeout_secs: 30,
            conversion_workers: 10,
            report_workers: 1,
        }
    }
}

/// Directory schema: which names are descended at each level
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaxonomySettings {
    pub allowed_flows: Vec<String>,
    /// Package directories qualify when their name contains one of these
    pub allowed_packages: Vec<String>,
    /// Flows with this prefix are wafer flows; the rest are package flows
    pub wafer_flow_prefix: String,
    /// Leaf subfolders under each wafer/badge directory
    pub subfolders: Vec<String>,
    /// Raw measurement file extensions, without the dot
    pub raw_extensions: Vec<String>,
    pub condition_dir: String,
    /// Lowercase file name prefix of condition artifacts
    pub condition_prefix: String,
}

impl Default for TaxonomySettings {
    fn default() -> Self {
        Self {
            allowed_flows: ["EWS1", "EWS2", "EWS3", "EWSDIE", "FT", "FT1", "FT2", "FIAB", "QC", "FA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_packages: ["QFP", "QFN", "DIP", "WLCSP", "CSP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            wafer_flow_prefix: "EWS".to_string(),
            subfolders: vec!["x30".to_string(), "VOLUME".to_string()],
            raw_extensions: vec!["std".to_string(), "stdf".to_string()],
            condition_dir: "CONDITION".to_string(),
            condition_prefix: "anaflow".to_string(),
        }
    }
}

/// External decoder invocation and readiness threshold
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub program: PathBuf,
    /// Extra arguments for each decoder run; the raw path is always first
    pub passes: Vec<Vec<String>>,
    /// Converted once the output directory holds more than this many tables
    pub ready_threshold: usize,
    pub output_dir: String,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("STDF2CSV.exe"),
            passes: vec![vec!["-t".to_string()], Vec::new()],
            ready_threshold: 8,
            output_dir: "csv".to_string(),
        }
    }
}

/// Whether the completion marker needs every composite to have succeeded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerPolicy {
    /// Write once every composite was attempted, failed or not
    #[default]
    Always,
    /// Write only when no composite failed; failures are retried next pass
    RequireSuccess,
}

/// Author and contact block copied into every parameter bag
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportMetadata {
    pub author: String,
    pub mail: String,
    pub site: String,
    pub group: String,
    pub revision: String,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            author: String::new(),
            mail: String::new(),
            site: String::new(),
            group: String::new(),
            revision: "0.1".to_string(),
        }
    }
}

/// External renderer invocation and report layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub program: PathBuf,
    /// Argument template; `{output}` and `{notebook}` are substituted
    pub args: Vec<String>,
    /// Holds one `<TYPE>.ipynb` per processing type
    pub notebook_dir: PathBuf,
    pub report_dir: String,
    pub marker_policy: MarkerPolicy,
    pub composites: CompositeRules,
    /// Record tables loaded once per leaf directory
    pub record_types: Vec<String>,
    /// JSON map of product code to display name
    pub personalization: Option<PathBuf>,
    pub metadata: ReportMetadata,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("jupyter"),
            args: [
                "nbconvert",
                "--execute",
                "--no-input",
                "--to",
                "html",
                "--output",
                "{output}",
                "{notebook}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            notebook_dir: PathBuf::from("jupiter"),
            report_dir: "Report".to_string(),
            marker_policy: MarkerPolicy::default(),
            composites: CompositeRules::default(),
            record_types: ["ptr", "ftr", "mir", "prr", "pcr", "hbr", "sbr", "tsr"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            personalization: None,
            metadata: ReportMetadata::default(),
        }
    }
}

/// Composite catalog source
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub program: PathBuf,
    /// Repository URL with `{cut}` and `{flow}` placeholders; when absent the
    /// static composites below are used instead
    pub url_template: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Offline lists keyed by `<CUT>/<FLOW>`, with `*` as the fallback key
    pub static_composites: HashMap<String, Vec<String>>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("svn"),
            url_template: None,
            username: None,
            password: None,
            static_composites: HashMap::new(),
        }
    }
}
