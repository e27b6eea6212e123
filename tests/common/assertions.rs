//! Custom assertions over event sequences

use news_enrich::{ArticleId, EventKind, PipelineEvent};
use std::collections::HashMap;

/// Counts carried by the final `PipelineCompleted` event
#[derive(Debug, PartialEq, Eq)]
pub struct Completion {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub cancelled: bool,
}

/// Extract the completion counts, panicking if the run did not complete
pub fn completion(events: &[PipelineEvent]) -> Completion {
    match events.last().map(|e| &e.kind) {
        Some(EventKind::PipelineCompleted {
            succeeded,
            failed,
            skipped,
            total,
            cancelled,
        }) => Completion {
            succeeded: *succeeded,
            failed: *failed,
            skipped: *skipped,
            total: *total,
            cancelled: *cancelled,
        },
        other => panic!("run did not end with PipelineCompleted: {other:?}"),
    }
}

/// Assert gapless sequence numbers and exactly one terminal event per article
pub fn assert_well_formed(events: &[PipelineEvent]) {
    let mut terminals: HashMap<&ArticleId, usize> = HashMap::new();
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.seq, i as u64, "gap in sequence at {i}");
        if let Some(id) = event.kind.article_id() {
            let seen = terminals.entry(id).or_default();
            assert_eq!(*seen, 0, "event for {id} after its terminal event");
            if event.kind.is_article_terminal() {
                *seen += 1;
            }
        }
    }
    for (id, count) in terminals {
        assert_eq!(count, 1, "article {id} has no terminal event");
    }

    let run_terminals = events.iter().filter(|e| e.kind.is_run_terminal()).count();
    assert_eq!(run_terminals, 1, "expected exactly one run-terminal event");
    assert!(events.last().is_some_and(|e| e.kind.is_run_terminal()));
}

/// Number of events with the given kind name
pub fn count_kind(events: &[PipelineEvent], name: &str) -> usize {
    events.iter().filter(|e| e.kind.name() == name).count()
}
