//! Performance telemetry accumulated across one synchronization run.
//!
//! The tracker is created per run, appended to concurrently by in-flight
//! storage and service operations, and summarized once after all writers
//! have finished. It never fails; telemetry problems are swallowed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kind of storage operation a file entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOperation {
    Get,
    Modify,
    Put,
    LocalWrite,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileOperation::Get => "GET",
            FileOperation::Modify => "MODIFY",
            FileOperation::Put => "PUT",
            FileOperation::LocalWrite => "LOCAL WRITE",
        };
        f.write_str(s)
    }
}

/// One timed event. Entries sharing a key are merged at summary time:
/// elapsed times sum, identity comes from the earliest-recorded member.
#[derive(Debug, Clone)]
pub enum PerfEntry {
    /// A storage operation against one document.
    File {
        uri: String,
        operation: FileOperation,
        elapsed: Duration,
        min_time_to_show: Duration,
    },
    /// A free-form timed message; `{time}` in the template is replaced
    /// with the merged elapsed time.
    Summary {
        template: String,
        elapsed: Duration,
        min_time_to_show: Duration,
    },
}

impl PerfEntry {
    /// Creates a file entry shown regardless of elapsed time.
    pub fn file(uri: impl Into<String>, operation: FileOperation, elapsed: Duration) -> Self {
        PerfEntry::File {
            uri: uri.into(),
            operation,
            elapsed,
            min_time_to_show: Duration::ZERO,
        }
    }

    /// Creates a summary entry shown regardless of elapsed time.
    pub fn summary(template: impl Into<String>, elapsed: Duration) -> Self {
        PerfEntry::Summary {
            template: template.into(),
            elapsed,
            min_time_to_show: Duration::ZERO,
        }
    }

    /// Sets the threshold below which the merged entry is hidden.
    #[must_use]
    pub fn with_min_time_to_show(mut self, min: Duration) -> Self {
        match &mut self {
            PerfEntry::File {
                min_time_to_show, ..
            }
            | PerfEntry::Summary {
                min_time_to_show, ..
            } => *min_time_to_show = min,
        }
        self
    }

    /// Total elapsed time of this (possibly merged) entry.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            PerfEntry::File { elapsed, .. } | PerfEntry::Summary { elapsed, .. } => *elapsed,
        }
    }

    fn min_time_to_show(&self) -> Duration {
        match self {
            PerfEntry::File {
                min_time_to_show, ..
            }
            | PerfEntry::Summary {
                min_time_to_show, ..
            } => *min_time_to_show,
        }
    }

    fn is_file(&self) -> bool {
        matches!(self, PerfEntry::File { .. })
    }

    fn key(&self) -> String {
        match self {
            PerfEntry::File { uri, operation, .. } => format!("file|{operation}|{uri}"),
            PerfEntry::Summary { template, .. } => format!("summary|{template}"),
        }
    }

    fn add_elapsed(&mut self, extra: Duration) {
        match self {
            PerfEntry::File { elapsed, .. } | PerfEntry::Summary { elapsed, .. } => {
                *elapsed += extra;
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            PerfEntry::File {
                uri,
                operation,
                elapsed,
                ..
            } => format!("{operation} {uri} : {}", format_duration(*elapsed)),
            PerfEntry::Summary {
                template, elapsed, ..
            } => template.replace("{time}", &format_duration(*elapsed)),
        }
    }
}

fn format_duration(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Accumulator of timed events. Append is safe under concurrent calls;
/// the summary is read only after all writers finished.
pub trait PerfTracker: Send + Sync {
    /// Records one timed event. Never fails.
    fn record(&self, entry: PerfEntry);

    /// Ranked report: top 5 file groups by total elapsed time descending,
    /// then summary groups in discovery order. Groups below their
    /// `min_time_to_show` are omitted.
    fn summary(&self) -> Vec<String>;
}

/// Recording tracker, one per synchronization run.
#[derive(Default)]
pub struct OperationPerfTracker {
    entries: Mutex<Vec<PerfEntry>>,
}

impl OperationPerfTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged entries in discovery order, before filtering and ranking.
    pub fn merged_entries(&self) -> Vec<PerfEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut merged: Vec<PerfEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in entries.iter() {
            match index.get(&entry.key()) {
                Some(&i) => merged[i].add_elapsed(entry.elapsed()),
                None => {
                    index.insert(entry.key(), merged.len());
                    merged.push(entry.clone());
                }
            }
        }
        merged
    }
}

impl PerfTracker for OperationPerfTracker {
    fn record(&self, entry: PerfEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn summary(&self) -> Vec<String> {
        let merged = self.merged_entries();

        let mut files: Vec<&PerfEntry> = Vec::new();
        let mut summaries: Vec<&PerfEntry> = Vec::new();
        for entry in merged.iter().filter(|e| e.elapsed() >= e.min_time_to_show()) {
            if entry.is_file() {
                files.push(entry);
            } else {
                summaries.push(entry);
            }
        }

        // Stable sort keeps discovery order among equal times.
        files.sort_by(|a, b| b.elapsed().cmp(&a.elapsed()));
        files.truncate(5);

        files
            .into_iter()
            .chain(summaries)
            .map(PerfEntry::describe)
            .collect()
    }
}

/// Tracker for callers that opt out of telemetry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpPerfTracker;

impl PerfTracker for NoOpPerfTracker {
    fn record(&self, _entry: PerfEntry) {}

    fn summary(&self) -> Vec<String> {
        Vec::new()
    }
}

enum ScopeTarget {
    File {
        uri: String,
        operation: FileOperation,
    },
    Summary {
        template: String,
    },
}

/// Scoped timer: records an entry when dropped, even if the wrapped
/// operation failed.
pub struct PerfScope {
    tracker: Arc<dyn PerfTracker>,
    started: Instant,
    target: ScopeTarget,
    min_time_to_show: Duration,
}

impl PerfScope {
    /// Times a storage operation against one document.
    pub fn file(
        tracker: Arc<dyn PerfTracker>,
        uri: impl Into<String>,
        operation: FileOperation,
    ) -> Self {
        Self {
            tracker,
            started: Instant::now(),
            target: ScopeTarget::File {
                uri: uri.into(),
                operation,
            },
            min_time_to_show: Duration::ZERO,
        }
    }

    /// Times a named phase; `{time}` in the template is replaced in the
    /// summary.
    pub fn summary(tracker: Arc<dyn PerfTracker>, template: impl Into<String>) -> Self {
        Self {
            tracker,
            started: Instant::now(),
            target: ScopeTarget::Summary {
                template: template.into(),
            },
            min_time_to_show: Duration::ZERO,
        }
    }

    /// Sets the threshold below which the merged entry is hidden.
    #[must_use]
    pub fn with_min_time_to_show(mut self, min: Duration) -> Self {
        self.min_time_to_show = min;
        self
    }
}

impl Drop for PerfScope {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let entry = match &self.target {
            ScopeTarget::File { uri, operation } => {
                PerfEntry::file(uri.clone(), *operation, elapsed)
            }
            ScopeTarget::Summary { template } => PerfEntry::summary(template.clone(), elapsed),
        };
        self.tracker
            .record(entry.with_min_time_to_show(self.min_time_to_show));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_records_on_drop() {
        let tracker = Arc::new(OperationPerfTracker::new());
        {
            let _scope = PerfScope::file(tracker.clone(), "memory:///a.json", FileOperation::Get);
        }
        assert_eq!(tracker.merged_entries().len(), 1);
    }

    #[test]
    fn scope_records_even_on_early_return() {
        let tracker = Arc::new(OperationPerfTracker::new());
        let failing = || -> Result<(), ()> {
            let _scope = PerfScope::summary(tracker.clone(), "phase: {time}");
            Err(())
        };
        assert!(failing().is_err());
        assert_eq!(tracker.merged_entries().len(), 1);
    }

    #[test]
    fn noop_tracker_reports_nothing() {
        let tracker = NoOpPerfTracker;
        tracker.record(PerfEntry::summary("x {time}", Duration::from_secs(9)));
        assert!(tracker.summary().is_empty());
    }
}
