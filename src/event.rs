//! Canonical event type flowing through the analysis pipeline

use serde::{Deserialize, Serialize};

/// A completed, duration-bearing unit of traced activity.
///
/// Events are immutable values: analyses that need to change a field
/// derive a new value (see [`Event::with_detail`]) instead of mutating
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Source file the event was parsed from (`-` for stdin)
    pub filename: String,
    /// Line number of the completing record within the source
    pub line: u64,
    /// Process id the record was attributed to
    pub pid: i32,
    /// Absolute timestamp in seconds, taken from the completing record
    pub time: f64,
    /// Elapsed seconds between the begin and end records
    pub duration: f64,
    /// Operation name, e.g. `fdatasync` or `block_rq(WS)`
    pub syscall: String,
    /// Free-form detail; meaning varies by analysis
    pub detail: Option<String>,
    /// Signed return value decoded from the exit record
    pub returncode: i64,
    /// File descriptor extracted from the enter record, when present
    pub fd: Option<i64>,
}

impl Event {
    /// Copy of this event with `detail` replaced
    pub fn with_detail(&self, detail: impl Into<String>) -> Event {
        Event {
            detail: Some(detail.into()),
            ..self.clone()
        }
    }
}
