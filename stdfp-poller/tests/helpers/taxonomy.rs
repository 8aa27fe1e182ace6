//! Throwaway taxonomy trees
//!
//! Builds `<root>/<product>/<cut>/<flow>/...` layouts inside a `TempDir`.

use std::fs;
use std::path::{Path, PathBuf};
use stdfp_poller::Settings;
use tempfile::TempDir;

pub const PRODUCT: &str = "A12";
pub const CUT: &str = "A12B";
pub const FLOW: &str = "EWS1";

/// Defaults with short timings for pooled tests
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.schedule.poll_interval_secs = 1;
    settings.schedule.queue_read_timeout_secs = 1;
    settings.schedule.queue_capacity = 4;
    settings.schedule.conversion_workers = 2;
    settings.schedule.report_workers = 1;
    settings
}

pub struct TaxonomyBuilder {
    temp_dir: TempDir,
}

impl TaxonomyBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn flow_dir(&self, flow: &str) -> PathBuf {
        self.root().join(PRODUCT).join(CUT).join(flow)
    }

    /// `<flow>/<lot>/<lot>_<wafer>/<subfolder>`
    pub fn wafer_leaf(&self, lot: &str, wafer: &str, subfolder: &str) -> PathBuf {
        let path = self
            .flow_dir(FLOW)
            .join(lot)
            .join(format!("{lot}_{wafer}"))
            .join(subfolder);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// `<flow>/<package>/<badge>/<subfolder>`
    pub fn package_leaf(&self, flow: &str, package: &str, badge: &str, subfolder: &str) -> PathBuf {
        let path = self.flow_dir(flow).join(package).join(badge).join(subfolder);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// `<flow>/CONDITION`
    pub fn condition_dir(&self, flow: &str) -> PathBuf {
        let path = self.flow_dir(flow).join("CONDITION");
        fs::create_dir_all(&path).unwrap();
        path
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn write_raw(leaf: &Path, name: &str) -> PathBuf {
    write_file(leaf, name, "raw")
}

/// `count` decoder tables in `<leaf>/csv`
pub fn write_tables(leaf: &Path, raw_name: &str, count: usize) {
    let csv = leaf.join("csv");
    fs::create_dir_all(&csv).unwrap();
    for i in 0..count {
        write_file(&csv, &format!("{raw_name}.t{i}.csv"), "A,B\n1,2\n");
    }
}

/// Test catalog table with `(number, name)` rows
pub fn write_test_catalog(leaf: &Path, raw_name: &str, rows: &[(&str, &str)]) {
    let csv = leaf.join("csv");
    fs::create_dir_all(&csv).unwrap();
    let mut text = String::from("TEST_NUM,TEST_NAM\n");
    for (number, name) in rows {
        text.push_str(&format!("{number},{name}\n"));
    }
    write_file(&csv, &format!("{raw_name}.tsr.csv"), &text);
}

/// HTML file names below `dir`, relative and sorted
pub fn html_files(dir: &Path) -> Vec<String> {
    let mut found: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "html"))
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();
    found.sort();
    found
}
