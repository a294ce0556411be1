use sleet_sync::{FileOperation, OperationPerfTracker, PerfEntry, PerfTracker};
use std::sync::Arc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ── Merging ──────────────────────────────────────────────────────

#[test]
fn same_key_entries_merge_and_sum() {
    let tracker = OperationPerfTracker::new();
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Get, ms(10)));
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Get, ms(20)));
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Get, ms(5)));

    let merged = tracker.merged_entries();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].elapsed(), ms(35));

    let summary = tracker.summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0], "GET memory:///a.json : 35ms");
}

#[test]
fn different_operations_on_same_file_stay_separate() {
    let tracker = OperationPerfTracker::new();
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Get, ms(10)));
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Put, ms(10)));

    assert_eq!(tracker.merged_entries().len(), 2);
}

#[test]
fn merged_identity_comes_from_earliest_entry() {
    let tracker = OperationPerfTracker::new();
    tracker.record(
        PerfEntry::file("memory:///a.json", FileOperation::Get, ms(10))
            .with_min_time_to_show(ms(1)),
    );
    // Later entries contribute time only; threshold stays the first one's.
    tracker.record(
        PerfEntry::file("memory:///a.json", FileOperation::Get, ms(20))
            .with_min_time_to_show(ms(500)),
    );

    let summary = tracker.summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0], "GET memory:///a.json : 30ms");
}

// ── Filtering ────────────────────────────────────────────────────

#[test]
fn entries_below_threshold_are_hidden() {
    let tracker = OperationPerfTracker::new();
    tracker.record(
        PerfEntry::file("memory:///slow.json", FileOperation::Put, ms(200))
            .with_min_time_to_show(ms(100)),
    );
    tracker.record(
        PerfEntry::file("memory:///fast.json", FileOperation::Put, ms(3))
            .with_min_time_to_show(ms(100)),
    );

    let summary = tracker.summary();
    assert_eq!(summary.len(), 1);
    assert!(summary[0].contains("slow.json"));
}

// ── Ranking ──────────────────────────────────────────────────────

#[test]
fn top_five_file_groups_by_total_time() {
    let tracker = OperationPerfTracker::new();
    for i in 0..8u64 {
        tracker.record(PerfEntry::file(
            format!("memory:///{i}.json"),
            FileOperation::Get,
            ms(10 * (i + 1)),
        ));
    }

    let summary = tracker.summary();
    assert_eq!(summary.len(), 5);
    // Slowest first.
    assert!(summary[0].contains("7.json"));
    assert!(summary[4].contains("3.json"));
}

#[test]
fn summaries_follow_files_in_discovery_order() {
    let tracker = OperationPerfTracker::new();
    tracker.record(PerfEntry::summary("phase b took {time}", ms(5)));
    tracker.record(PerfEntry::file("memory:///a.json", FileOperation::Get, ms(1)));
    tracker.record(PerfEntry::summary("phase a took {time}", ms(50)));

    let summary = tracker.summary();
    assert_eq!(summary.len(), 3);
    assert!(summary[0].starts_with("GET"));
    assert_eq!(summary[1], "phase b took 5ms");
    assert_eq!(summary[2], "phase a took 50ms");
}

#[test]
fn summary_template_replaces_time_placeholder() {
    let tracker = OperationPerfTracker::new();
    tracker.record(PerfEntry::summary("feed synchronized in {time}", ms(1500)));

    assert_eq!(tracker.summary()[0], "feed synchronized in 1.5s");
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn concurrent_appends_are_all_recorded() {
    let tracker = Arc::new(OperationPerfTracker::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let tracker = tracker.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                tracker.record(PerfEntry::file(
                    "memory:///shared.json",
                    FileOperation::Modify,
                    ms(1),
                ));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let merged = tracker.merged_entries();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].elapsed(), ms(800));
}
