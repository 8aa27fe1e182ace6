//! Tabular inputs of a converted leaf
//!
//! Loaded once per leaf directory and shared by every composite rendered for
//! it. Only the test catalog (`tsr` table) is parsed; the other tables are
//! handed to the renderer by path.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stdfp_common::logging::targets;
use tracing::warn;

/// Record type holding the test catalog
pub const TEST_CATALOG_RECORD: &str = "tsr";

/// Test names selected for the test-time summary
const TEST_TIME_PATTERN: &str = r"log_ttime.*";

/// One row of the test catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestEntry {
    #[serde(rename = "TEST_NUM")]
    pub number: String,
    #[serde(rename = "TEST_NAM")]
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecordTables {
    /// Present tables by record type
    pub tables: BTreeMap<String, PathBuf>,
    /// Record types whose table was not found
    pub missing: Vec<String>,
    pub tests: Vec<TestEntry>,
}

impl RecordTables {
    /// Locate `<base>.<record>.csv` for each record type and read the test catalog
    pub fn load(tables_base: &Path, record_types: &[String]) -> Self {
        let mut tables = BTreeMap::new();
        let mut missing = Vec::new();

        for record in record_types {
            let path = table_path(tables_base, record);
            if path.is_file() {
                tables.insert(record.clone(), path);
            } else {
                missing.push(record.clone());
            }
        }

        if !missing.is_empty() {
            warn!(
                target: targets::REPORT,
                "Missing tables for {}: {}",
                tables_base.display(),
                missing.join(", ")
            );
        }

        let tests = match tables.get(TEST_CATALOG_RECORD) {
            Some(path) => match read_test_catalog(path) {
                Ok(tests) => tests,
                Err(e) => {
                    warn!(target: targets::REPORT, "Unreadable test catalog {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Self {
            tables,
            missing,
            tests,
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.tables.values().cloned().collect()
    }

    /// Test numbers whose name marks them as part of `composite`, first occurrence order
    pub fn tests_for_composite(&self, composite: &str) -> Vec<String> {
        let c = regex::escape(composite);
        let pattern = format!(r"^(.*_{c}_.*:.*|.*_{c}_..$|.*_{c}_.*_DELTA_.*)");
        self.select(&pattern)
    }

    /// Test numbers of the test-time probes
    pub fn test_time_tests(&self) -> Vec<String> {
        self.select(TEST_TIME_PATTERN)
    }

    fn select(&self, pattern: &str) -> Vec<String> {
        let Ok(re) = Regex::new(pattern) else {
            return Vec::new();
        };

        let mut numbers: Vec<String> = Vec::new();
        for test in self.tests.iter().filter(|t| re.is_match(&t.name)) {
            if !numbers.contains(&test.number) {
                numbers.push(test.number.clone());
            }
        }
        numbers
    }
}

pub fn table_path(tables_base: &Path, record: &str) -> PathBuf {
    let mut name = tables_base.as_os_str().to_os_string();
    name.push(format!(".{record}.csv"));
    PathBuf::from(name)
}

fn read_test_catalog(path: &Path) -> Result<Vec<TestEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut tests = Vec::new();
    for row in reader.deserialize() {
        tests.push(row?);
    }
    Ok(tests)
}
