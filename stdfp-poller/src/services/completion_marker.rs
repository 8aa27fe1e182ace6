//! Completion markers
//!
//! A marker's presence means every known composite of its directory has been
//! attempted; absence means unknown. Markers are written under a temporary
//! name in the same directory and renamed into place, so a reader never sees
//! a partial file.

use crate::models::ReportKind;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use stdfp_common::time::local_stamp;

pub const REPORT_MARKER: &str = "REPORT DONE.txt";
pub const CONDITION_MARKER: &str = "CONDITION_REPORT_DONE.txt";

const REPORT_MARKER_TEXT: &str = "IF YOU READ THIS ALL REPORT HAVE BEEN GENERATED\n\
THIS FOLDER WILL BE SKIPPED\n\
IN CASE DELETE THIS FILE END REPORT YOU WANT TO REGENERATE AND WAIT\n";

const CONDITION_MARKER_TEXT: &str = "IF YOU READ THIS ALL CONDITION REPORTS HAVE BEEN GENERATED\n\
THIS FOLDER WILL BE SKIPPED FOR CONDITION PROCESSING\n\
IN CASE DELETE THIS FILE IF YOU WANT TO REGENERATE CONDITION REPORTS AND WAIT\n";

/// Marker file name for a report flavour
pub fn marker_name(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Measurement => REPORT_MARKER,
        ReportKind::Condition => CONDITION_MARKER,
    }
}

pub fn marker_path(dir: &Path, kind: ReportKind) -> PathBuf {
    dir.join(marker_name(kind))
}

pub fn is_complete(dir: &Path, kind: ReportKind) -> bool {
    marker_path(dir, kind).is_file()
}

/// Write (or refresh) the marker in `dir`
pub fn write_marker(dir: &Path, kind: ReportKind) -> io::Result<PathBuf> {
    let target = marker_path(dir, kind);
    let tmp = dir.join(format!(".{}.tmp", marker_name(kind)));

    let text = match kind {
        ReportKind::Measurement => REPORT_MARKER_TEXT,
        ReportKind::Condition => CONDITION_MARKER_TEXT,
    };

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        writeln!(file, "WRITTEN {}", local_stamp())?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(target)
}
