//! Parameter bag handed to the external renderer
//!
//! Serialized with the upper-case keys the report notebooks read. A fresh
//! value is built for every (directory, composite) pair and never reused.

use crate::config::ReportMetadata;
use crate::models::taxonomy::{ConditionItem, WorkItem};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Label used for every taxonomy attribute a condition artifact lacks
pub const CONDITION_LABEL: &str = "CONDITION";

/// Source file entry under `FILE`, keyed by wafer/badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub corner: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeParameter {
    #[serde(rename = "TITLE")]
    pub title: String,
    #[serde(rename = "COM")]
    pub composite: String,
    #[serde(rename = "FLOW")]
    pub flow: String,
    #[serde(rename = "TYPE")]
    pub processing_type: String,
    /// Display name from the personalization file
    #[serde(rename = "PRODUCT")]
    pub product_name: String,
    /// Product code (directory name)
    #[serde(rename = "CODE")]
    pub product: String,
    #[serde(rename = "LOT")]
    pub lot: String,
    #[serde(rename = "WAFER")]
    pub wafer: String,
    #[serde(rename = "CUT")]
    pub product_cut: String,
    #[serde(rename = "REVISION")]
    pub revision: String,
    #[serde(rename = "FILE")]
    pub files: BTreeMap<String, SourceFile>,
    #[serde(rename = "AUTHOR")]
    pub author: String,
    #[serde(rename = "MAIL")]
    pub mail: String,
    #[serde(rename = "SITE")]
    pub site: String,
    #[serde(rename = "GROUP")]
    pub group: String,
    #[serde(rename = "TEST_NUM")]
    pub test_numbers: Vec<String>,
    /// Tables prefix (measurement) or artifact path (condition)
    #[serde(rename = "CSV")]
    pub tables: String,
}

impl CompositeParameter {
    pub fn for_measurement(
        item: &WorkItem,
        composite: &str,
        title: String,
        product_name: &str,
        metadata: &ReportMetadata,
        test_numbers: Vec<String>,
        tables_base: &Path,
    ) -> Self {
        let position = &item.position;
        let wafer = position.wafer().to_string();

        let mut files = BTreeMap::new();
        files.insert(
            wafer.clone(),
            SourceFile {
                corner: position.corner().to_string(),
                path: item.raw_path.to_string_lossy().into_owned(),
            },
        );

        Self {
            title,
            composite: composite.to_string(),
            flow: position.flow.to_uppercase(),
            processing_type: position.processing_type.to_uppercase(),
            product_name: product_name.to_string(),
            product: position.product.to_uppercase(),
            lot: position.lot.to_uppercase(),
            wafer,
            product_cut: position.product_cut.to_uppercase(),
            revision: metadata.revision.clone(),
            files,
            author: metadata.author.clone(),
            mail: metadata.mail.clone(),
            site: metadata.site.clone(),
            group: metadata.group.clone(),
            test_numbers,
            tables: tables_base.to_string_lossy().into_owned(),
        }
    }

    pub fn for_condition(
        item: &ConditionItem,
        composite: &str,
        title: String,
        product_name: &str,
        metadata: &ReportMetadata,
    ) -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            CONDITION_LABEL.to_string(),
            SourceFile {
                corner: CONDITION_LABEL.to_string(),
                path: item.artifact.to_string_lossy().into_owned(),
            },
        );

        Self {
            title,
            composite: composite.to_string(),
            flow: item.flow.to_uppercase(),
            processing_type: CONDITION_LABEL.to_string(),
            product_name: product_name.to_string(),
            product: item.product.to_uppercase(),
            lot: CONDITION_LABEL.to_string(),
            wafer: CONDITION_LABEL.to_string(),
            product_cut: item.product_cut.to_uppercase(),
            revision: metadata.revision.clone(),
            files,
            author: metadata.author.clone(),
            mail: metadata.mail.clone(),
            site: metadata.site.clone(),
            group: metadata.group.clone(),
            test_numbers: Vec::new(),
            tables: item.artifact.to_string_lossy().into_owned(),
        }
    }
}
