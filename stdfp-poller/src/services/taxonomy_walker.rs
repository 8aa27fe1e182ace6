//! Taxonomy walker
//!
//! Descends only the fixed levels of the directory schema:
//!
//! ```text
//! <root>/<product>/<cut>/<flow>/<lot>/<lot>_<NN>/<subfolder>        wafer flows
//! <root>/<product>/<cut>/<flow>/<package>/<badge>/<subfolder>       package flows
//! <root>/<product>/<cut>/<flow>/CONDITION                           condition artifacts
//! ```
//!
//! Every level is listed with a one-deep `WalkDir`; a directory that cannot be
//! read is logged and skipped so its siblings are still visited.

use crate::config::TaxonomySettings;
use crate::error::ScanError;
use crate::models::{
    ConditionDirectory, FlowKind, LeafDirectory, TaxonomyEntry, TaxonomyPosition,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use stdfp_common::logging::targets;
use walkdir::WalkDir;

/// Product directories: three upper-case hexadecimal characters
const PRODUCT_PATTERN: &str = r"^[A-F0-9]{3}$";

/// Named child directory
#[derive(Debug, Clone)]
pub struct ChildDir {
    pub name: String,
    pub path: PathBuf,
}

/// Lazy, schema-bounded traversal of the watch root
pub struct TaxonomyWalker {
    root: PathBuf,
    settings: TaxonomySettings,
    product_regex: Regex,
}

impl TaxonomyWalker {
    pub fn new(root: impl Into<PathBuf>, settings: TaxonomySettings) -> Result<Self, ScanError> {
        Ok(Self {
            root: root.into(),
            settings,
            product_regex: Regex::new(PRODUCT_PATTERN)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &TaxonomySettings {
        &self.settings
    }

    /// Verify the watch root before a pass starts
    pub fn check_root(&self) -> Result<(), ScanError> {
        if !self.root.exists() {
            return Err(ScanError::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Product directories directly under the root, sorted by name
    pub fn products(&self) -> Vec<ChildDir> {
        child_dirs(&self.root)
            .into_iter()
            .filter(|d| self.product_regex.is_match(&d.name))
            .collect()
    }

    /// Every leaf and condition directory of the whole tree
    pub fn walk(&self) -> impl Iterator<Item = TaxonomyEntry> + '_ {
        self.products()
            .into_iter()
            .flat_map(move |product| self.walk_product(product))
    }

    /// Every leaf and condition directory below one product directory
    pub fn walk_product(&self, product: ChildDir) -> impl Iterator<Item = TaxonomyEntry> + '_ {
        let cut_regex = product_cut_regex(&product.name);
        let product_name = product.name.clone();

        child_dirs(&product.path)
            .into_iter()
            .filter(move |cut| cut_regex.as_ref().is_some_and(|re| re.is_match(&cut.name)))
            .flat_map(move |cut| {
                let product_name = product_name.clone();
                child_dirs(&cut.path)
                    .into_iter()
                    .filter(move |flow| self.settings.allowed_flows.iter().any(|f| f == &flow.name))
                    .flat_map(move |flow| self.walk_flow(&product_name, &cut.name, flow))
            })
    }

    fn walk_flow(&self, product: &str, cut: &str, flow: ChildDir) -> Vec<TaxonomyEntry> {
        let mut entries = Vec::new();

        let condition_path = flow.path.join(&self.settings.condition_dir);
        if condition_path.is_dir() {
            entries.push(TaxonomyEntry::Condition(ConditionDirectory {
                path: condition_path,
                product: product.to_string(),
                product_cut: cut.to_string(),
                flow: flow.name.clone(),
            }));
        }

        let kind = self.flow_kind(&flow.name);
        for group in child_dirs(&flow.path) {
            if group.name == self.settings.condition_dir {
                continue;
            }

            let units: Vec<ChildDir> = match kind {
                FlowKind::Wafer => {
                    let Some(wafer_regex) = wafer_regex(&group.name) else {
                        continue;
                    };
                    child_dirs(&group.path)
                        .into_iter()
                        .filter(|w| wafer_regex.is_match(&w.name))
                        .collect()
                }
                FlowKind::Package => {
                    let allowed = self
                        .settings
                        .allowed_packages
                        .iter()
                        .any(|p| group.name.contains(p.as_str()));
                    if !allowed {
                        continue;
                    }
                    child_dirs(&group.path)
                }
            };

            for unit in units {
                for subfolder in &self.settings.subfolders {
                    let path = unit.path.join(subfolder);
                    if !path.is_dir() {
                        continue;
                    }
                    entries.push(TaxonomyEntry::Leaf(LeafDirectory {
                        path,
                        position: TaxonomyPosition {
                            product: product.to_string(),
                            product_cut: cut.to_string(),
                            flow: flow.name.clone(),
                            flow_kind: kind,
                            lot: group.name.clone(),
                            unit: unit.name.clone(),
                            processing_type: subfolder.clone(),
                        },
                    }));
                }
            }
        }

        entries
    }

    pub fn flow_kind(&self, flow: &str) -> FlowKind {
        if flow.starts_with(&self.settings.wafer_flow_prefix) {
            FlowKind::Wafer
        } else {
            FlowKind::Package
        }
    }
}

/// `<product>` followed by exactly one upper-case letter
fn product_cut_regex(product: &str) -> Option<Regex> {
    Regex::new(&format!("^{}[A-Z]$", regex::escape(product))).ok()
}

/// `<lot>_01` through `<lot>_25`
fn wafer_regex(lot: &str) -> Option<Regex> {
    Regex::new(&format!("^{}_(0[1-9]|1[0-9]|2[0-5])$", regex::escape(lot))).ok()
}

/// Immediate subdirectories of `dir`, sorted by name
///
/// Unreadable directories and entries are logged and left out.
pub fn child_dirs(dir: &Path) -> Vec<ChildDir> {
    let mut children = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_dir() {
                    children.push(ChildDir {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        path: entry.path().to_path_buf(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(target: targets::POLLING, "Skipping unreadable entry under {}: {}", dir.display(), e);
            }
        }
    }

    children
}

/// Regular files directly inside `dir`, sorted by name
pub fn child_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}
