//! Timestamp utilities

use chrono::Local;

/// Local wall-clock stamp for human-readable files (markers, report configs)
pub fn local_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}
