//! Readiness classifier
//!
//! Decides for every leaf directory which single work list, if any, it belongs
//! to. The order of checks matters:
//!
//! 1. completion marker present: complete, nothing to do
//! 2. not exactly one raw file: ambiguous, skipped
//! 3. conversion output at or below the threshold: conversion
//! 4. no report directory, or a renderable composite without HTML: report
//!
//! A leaf queued for conversion is never queued for report in the same pass;
//! conversion has to be observed by a later pass first.

use crate::config::Settings;
use crate::models::{
    CompositeRules, ConditionDirectory, ConditionItem, LeafDirectory, ReportKind, WorkItem,
};
use crate::services::completion_marker;
use crate::services::composite_catalog::PassCatalog;
use crate::services::ledger::DedupLedger;
use crate::services::taxonomy_walker::child_files;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Classification of one leaf directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Completion marker present
    Complete,
    /// Zero or several raw files; never processed
    Ambiguous { raw_files: usize },
    /// Already queued earlier in this pass
    AlreadyQueued,
    Convert(WorkItem),
    Report(WorkItem),
    /// Converted and every renderable composite has HTML
    UpToDate,
}

/// Classification of one `CONDITION` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionReadiness {
    Complete,
    Artifacts(Vec<ConditionItem>),
}

/// The three work lists a discovery pass produces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkLists {
    pub conversion: Vec<WorkItem>,
    pub report: Vec<WorkItem>,
    pub condition: Vec<ConditionItem>,
}

impl WorkLists {
    pub fn is_empty(&self) -> bool {
        self.conversion.is_empty() && self.report.is_empty() && self.condition.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conversion.len() + self.report.len() + self.condition.len()
    }
}

pub struct ReadinessClassifier {
    raw_extensions: Vec<String>,
    output_dir: String,
    ready_threshold: usize,
    report_dir: String,
    condition_prefix: String,
    rules: CompositeRules,
}

impl ReadinessClassifier {
    pub fn new(settings: &Settings) -> Self {
        Self {
            raw_extensions: settings
                .taxonomy
                .raw_extensions
                .iter()
                .map(|e| format!(".{}", e.trim_start_matches('.').to_lowercase()))
                .collect(),
            output_dir: settings.conversion.output_dir.clone(),
            ready_threshold: settings.conversion.ready_threshold,
            report_dir: settings.report.report_dir.clone(),
            condition_prefix: settings.taxonomy.condition_prefix.to_lowercase(),
            rules: settings.report.composites.clone(),
        }
    }

    fn is_raw_file(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.raw_extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Raw measurement files directly inside `dir`
    pub fn raw_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(child_files(dir)?
            .into_iter()
            .filter(|name| self.is_raw_file(name))
            .collect())
    }

    /// Number of tables in the conversion output directory; 0 when absent
    pub fn converted_tables(&self, leaf_dir: &Path) -> io::Result<usize> {
        let output = leaf_dir.join(&self.output_dir);
        match child_files(&output) {
            Ok(files) => Ok(files
                .iter()
                .filter(|f| f.to_lowercase().ends_with(".csv"))
                .count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Converted once strictly more than the threshold of tables exist
    pub fn conversion_ready(&self, leaf_dir: &Path) -> io::Result<bool> {
        Ok(self.converted_tables(leaf_dir)? > self.ready_threshold)
    }

    pub async fn classify_leaf(
        &self,
        leaf: &LeafDirectory,
        ledger: &mut DedupLedger,
        catalog: &mut PassCatalog<'_>,
    ) -> io::Result<Readiness> {
        if completion_marker::is_complete(&leaf.path, ReportKind::Measurement) {
            return Ok(Readiness::Complete);
        }

        let raw = self.raw_files(&leaf.path)?;
        if raw.len() != 1 {
            return Ok(Readiness::Ambiguous {
                raw_files: raw.len(),
            });
        }
        let item = WorkItem::new(leaf, raw[0].clone());

        if !self.conversion_ready(&leaf.path)? {
            if !ledger.insert(&item.raw_path) {
                return Ok(Readiness::AlreadyQueued);
            }
            return Ok(Readiness::Convert(item));
        }

        let report_root = item.report_root(&self.report_dir);
        let needs_report = if !report_root.is_dir() {
            true
        } else {
            let composites = catalog
                .composites(&leaf.position.product_cut, &leaf.position.flow)
                .await;
            !self
                .missing_composites(&report_root, composites, &leaf.position.processing_type)
                .is_empty()
        };

        if !needs_report {
            return Ok(Readiness::UpToDate);
        }
        if !ledger.insert(&item.raw_path) {
            return Ok(Readiness::AlreadyQueued);
        }
        Ok(Readiness::Report(item))
    }

    /// Renderable composites with no HTML anywhere under `report_root`
    ///
    /// A composite counts as present when its name, or its title form with
    /// underscores as spaces, appears in an HTML file name.
    pub fn missing_composites(
        &self,
        report_root: &Path,
        composites: &[String],
        processing_type: &str,
    ) -> Vec<String> {
        let html = html_file_names(report_root);

        composites
            .iter()
            .filter(|c| !self.rules.should_skip(c, ReportKind::Measurement, processing_type))
            .filter(|c| {
                let spaced = c.replace('_', " ");
                !html
                    .iter()
                    .any(|h| h.contains(c.as_str()) || h.contains(spaced.as_str()))
            })
            .cloned()
            .collect()
    }

    pub fn classify_condition(&self, dir: &ConditionDirectory) -> io::Result<ConditionReadiness> {
        if completion_marker::is_complete(&dir.path, ReportKind::Condition) {
            return Ok(ConditionReadiness::Complete);
        }

        let items = child_files(&dir.path)?
            .into_iter()
            .filter(|name| self.is_condition_artifact(name))
            .map(|name| ConditionItem::new(dir, &name))
            .collect();

        Ok(ConditionReadiness::Artifacts(items))
    }

    fn is_condition_artifact(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        name.starts_with(&self.condition_prefix) && (name.ends_with(".csv") || name.ends_with(".html"))
    }
}

/// File names of every `.html` below `dir`
fn html_file_names(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.to_lowercase().ends_with(".html"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowKind, TaxonomyPosition};
    use crate::services::composite_catalog::{CompositeCatalog, StaticCompositeSource};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn leaf(root: &Path, processing_type: &str) -> LeafDirectory {
        let path = root.join("A12/A12B/EWS1/LOT1/LOT1_01").join(processing_type);
        fs::create_dir_all(&path).unwrap();
        LeafDirectory {
            path,
            position: TaxonomyPosition {
                product: "A12".to_string(),
                product_cut: "A12B".to_string(),
                flow: "EWS1".to_string(),
                flow_kind: FlowKind::Wafer,
                lot: "LOT1".to_string(),
                unit: "LOT1_01".to_string(),
                processing_type: processing_type.to_string(),
            },
        }
    }

    fn write_tables(dir: &Path, count: usize) {
        let csv = dir.join("csv");
        fs::create_dir_all(&csv).unwrap();
        for i in 0..count {
            fs::write(csv.join(format!("X.std.t{i}.csv")), "").unwrap();
        }
    }

    fn catalog(extra: &[&str]) -> CompositeCatalog {
        let source = StaticCompositeSource::uniform(extra.iter().map(|s| s.to_string()).collect());
        CompositeCatalog::new(Arc::new(source), &CompositeRules::default())
    }

    async fn classify(leaf: &LeafDirectory, catalog: &CompositeCatalog) -> Readiness {
        let classifier = ReadinessClassifier::new(&Settings::default());
        let mut ledger = DedupLedger::new();
        let mut pass = PassCatalog::new(catalog);
        classifier.classify_leaf(leaf, &mut ledger, &mut pass).await.unwrap()
    }

    #[tokio::test]
    async fn test_marker_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        fs::write(leaf.path.join("X.std"), "").unwrap();
        completion_marker::write_marker(&leaf.path, ReportKind::Measurement).unwrap();

        assert_eq!(classify(&leaf, &catalog(&[])).await, Readiness::Complete);
    }

    #[tokio::test]
    async fn test_ambiguous_raw_file_counts() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        assert_eq!(
            classify(&leaf, &catalog(&[])).await,
            Readiness::Ambiguous { raw_files: 0 }
        );

        fs::write(leaf.path.join("X.std"), "").unwrap();
        fs::write(leaf.path.join("Y.stdf"), "").unwrap();
        assert_eq!(
            classify(&leaf, &catalog(&[])).await,
            Readiness::Ambiguous { raw_files: 2 }
        );
    }

    #[tokio::test]
    async fn test_threshold_gates_conversion() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        fs::write(leaf.path.join("X.std"), "").unwrap();

        write_tables(&leaf.path, 8);
        assert!(matches!(classify(&leaf, &catalog(&[])).await, Readiness::Convert(_)));

        write_tables(&leaf.path, 9);
        assert!(matches!(classify(&leaf, &catalog(&[])).await, Readiness::Report(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_output_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        fs::write(leaf.path.join("X.std"), "").unwrap();
        write_tables(&leaf.path, 9);
        let output = leaf.path.join("csv");
        fs::set_permissions(&output, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind root
        let readable = fs::read_dir(&output).is_ok();

        let classifier = ReadinessClassifier::new(&Settings::default());
        let catalog = catalog(&[]);
        let mut pass = PassCatalog::new(&catalog);
        let mut ledger = DedupLedger::new();
        let result = classifier.classify_leaf(&leaf, &mut ledger, &mut pass).await;
        fs::set_permissions(&output, fs::Permissions::from_mode(0o755)).unwrap();

        if !readable {
            assert!(result.is_err());
            assert!(ledger.is_empty());
        }
    }

    #[test]
    fn test_missing_output_counts_no_tables() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        let classifier = ReadinessClassifier::new(&Settings::default());

        assert_eq!(classifier.converted_tables(&leaf.path).unwrap(), 0);
        assert!(!classifier.conversion_ready(&leaf.path).unwrap());
    }

    #[tokio::test]
    async fn test_ledger_prevents_second_queueing() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        fs::write(leaf.path.join("X.std"), "").unwrap();

        let classifier = ReadinessClassifier::new(&Settings::default());
        let catalog = catalog(&[]);
        let mut pass = PassCatalog::new(&catalog);
        let mut ledger = DedupLedger::new();

        let first = classifier.classify_leaf(&leaf, &mut ledger, &mut pass).await.unwrap();
        let second = classifier.classify_leaf(&leaf, &mut ledger, &mut pass).await.unwrap();

        assert!(matches!(first, Readiness::Convert(_)));
        assert_eq!(second, Readiness::AlreadyQueued);
    }

    #[tokio::test]
    async fn test_report_dir_compared_against_catalog() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "VOLUME");
        fs::write(leaf.path.join("X.std"), "").unwrap();
        write_tables(&leaf.path, 9);

        let report = leaf.path.join("Report");
        fs::create_dir_all(report.join("VOLUME")).unwrap();
        fs::write(report.join("YIELD EWS1 volume.html"), "").unwrap();
        fs::write(report.join("TTIME EWS1 volume.html"), "").unwrap();

        let catalog = catalog(&["VREF_TRIM", "INIT"]);
        assert!(matches!(classify(&leaf, &catalog).await, Readiness::Report(_)));

        fs::write(report.join("VOLUME").join("VREF TRIM EWS1 volume.html"), "").unwrap();
        // INIT is never rendered, so it does not keep the directory pending
        assert_eq!(classify(&leaf, &catalog).await, Readiness::UpToDate);
    }

    #[tokio::test]
    async fn test_x30_ignores_summary_composites() {
        let tmp = TempDir::new().unwrap();
        let leaf = leaf(tmp.path(), "x30");
        fs::write(leaf.path.join("X.std"), "").unwrap();
        write_tables(&leaf.path, 9);
        fs::create_dir_all(leaf.path.join("Report")).unwrap();

        assert_eq!(classify(&leaf, &catalog(&[])).await, Readiness::UpToDate);
    }

    #[test]
    fn test_condition_artifacts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CONDITION");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("AnaFlow_1.csv"), "").unwrap();
        fs::write(path.join("anaflow_2.html"), "").unwrap();
        fs::write(path.join("anaflow_3.txt"), "").unwrap();
        fs::write(path.join("other.csv"), "").unwrap();

        let dir = ConditionDirectory {
            path: path.clone(),
            product: "A12".to_string(),
            product_cut: "A12B".to_string(),
            flow: "FT".to_string(),
        };
        let classifier = ReadinessClassifier::new(&Settings::default());

        match classifier.classify_condition(&dir).unwrap() {
            ConditionReadiness::Artifacts(items) => {
                let names: Vec<PathBuf> = items.iter().map(|i| i.artifact.clone()).collect();
                assert_eq!(names, vec![path.join("AnaFlow_1.csv"), path.join("anaflow_2.html")]);
            }
            other => panic!("unexpected {other:?}"),
        }

        completion_marker::write_marker(&path, ReportKind::Condition).unwrap();
        assert_eq!(
            classifier.classify_condition(&dir).unwrap(),
            ConditionReadiness::Complete
        );
    }
}
