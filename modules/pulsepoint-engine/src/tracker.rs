//! Completion-tracking rules: when a source has enough results, when a
//! topic is done, and when its summary should be (re)generated. Pure
//! functions over `CompletionProgress` so every rule is testable without a
//! store.

use std::collections::BTreeMap;

use pulsepoint_common::{CompletionProgress, Summary};

/// Raise a source's satisfied count to at least the persisted result count.
/// Counters never move down on this path — re-running completion is
/// additive, it must not replace totals with smaller fresh-batch counts.
pub fn observe_persisted(progress: &mut CompletionProgress, source: &str, persisted: u64) {
    let counter = progress.satisfied.entry(source.to_string()).or_insert(0);
    *counter = (*counter).max(clamp(persisted));
}

/// Merge-add newly persisted results for a source.
pub fn merge_add(progress: &mut CompletionProgress, source: &str, newly_saved: u32) {
    *progress.satisfied.entry(source.to_string()).or_insert(0) += newly_saved;
}

/// A topic is complete iff every catalog source has reached the threshold.
pub fn evaluate_complete(
    progress: &CompletionProgress,
    catalog_sources: &[&str],
    threshold: u32,
) -> bool {
    catalog_sources
        .iter()
        .all(|s| progress.satisfied.get(*s).copied().unwrap_or(0) >= threshold)
}

/// Regenerate the summary if the topic was previously incomplete, has no
/// summary yet, or only carries an empty/failed placeholder. This is what
/// keeps a transient upstream failure from freezing a topic unsummarized.
pub fn needs_summary(previously_complete: bool, existing: Option<&Summary>) -> bool {
    !previously_complete || existing.is_none_or(Summary::is_sentinel)
}

/// Recompute the satisfied counts from actual persisted result counts and
/// re-evaluate completeness. Idempotent: running it twice over the same
/// counts produces identical output. Unlike the fetch path this may lower
/// counters — it is the self-healing recount used to repair drift.
pub fn reconcile(
    progress: &mut CompletionProgress,
    counts: &BTreeMap<String, u64>,
    catalog_sources: &[&str],
    threshold: u32,
) {
    for source in catalog_sources {
        let counted = counts.get(*source).copied().unwrap_or(0);
        progress.satisfied.insert(source.to_string(), clamp(counted));
    }
    // Sources outside the catalog still get truthful counters.
    for (source, counted) in counts {
        if !catalog_sources.contains(&source.as_str()) {
            progress.satisfied.insert(source.clone(), clamp(*counted));
        }
    }
    progress.complete = evaluate_complete(progress, catalog_sources, threshold);
}

fn clamp(n: u64) -> u32 {
    n.min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsepoint_common::{SummaryData, NO_DATA_SYNOPSIS};
    use uuid::Uuid;

    const SOURCES: &[&str] = &["a", "b"];

    fn progress() -> CompletionProgress {
        CompletionProgress::new(Uuid::new_v4(), SOURCES.iter().copied())
    }

    #[test]
    fn merge_add_is_additive_not_overwriting() {
        let mut p = progress();
        merge_add(&mut p, "a", 3);
        merge_add(&mut p, "a", 2);
        assert_eq!(p.satisfied["a"], 5);
    }

    #[test]
    fn observe_persisted_never_lowers_a_counter() {
        let mut p = progress();
        observe_persisted(&mut p, "a", 4);
        assert_eq!(p.satisfied["a"], 4);
        observe_persisted(&mut p, "a", 2);
        assert_eq!(p.satisfied["a"], 4);
    }

    #[test]
    fn complete_requires_every_source_at_threshold() {
        let mut p = progress();
        merge_add(&mut p, "a", 4);
        assert!(!evaluate_complete(&p, SOURCES, 4));
        merge_add(&mut p, "b", 4);
        assert!(evaluate_complete(&p, SOURCES, 4));
    }

    #[test]
    fn unknown_extra_sources_do_not_affect_completeness() {
        let mut p = progress();
        merge_add(&mut p, "a", 4);
        merge_add(&mut p, "b", 4);
        merge_add(&mut p, "mystery", 1);
        assert!(evaluate_complete(&p, SOURCES, 4));
    }

    #[test]
    fn reconcile_recounts_and_is_idempotent() {
        let mut p = progress();
        merge_add(&mut p, "a", 9);
        p.complete = true;

        let counts = BTreeMap::from([("a".to_string(), 5u64), ("b".to_string(), 4u64)]);
        reconcile(&mut p, &counts, SOURCES, 4);
        assert_eq!(p.satisfied["a"], 5);
        assert_eq!(p.satisfied["b"], 4);
        assert!(p.complete);

        let first = p.clone();
        reconcile(&mut p, &counts, SOURCES, 4);
        assert_eq!(p, first);
    }

    #[test]
    fn reconcile_flips_complete_back_when_results_vanish() {
        let mut p = progress();
        merge_add(&mut p, "a", 4);
        merge_add(&mut p, "b", 4);
        p.complete = true;

        // b's results were deleted out from under us.
        let counts = BTreeMap::from([("a".to_string(), 4u64)]);
        reconcile(&mut p, &counts, SOURCES, 4);
        assert_eq!(p.satisfied["b"], 0);
        assert!(!p.complete);
    }

    #[test]
    fn summary_regeneration_rule() {
        let real = Summary::from_data(
            Uuid::new_v4(),
            SummaryData {
                synopsis: "real".to_string(),
                insights: String::new(),
                cross_references: String::new(),
                tags: vec![],
            },
        );
        let sentinel = Summary::from_data(Uuid::new_v4(), SummaryData::no_data());
        assert_eq!(sentinel.synopsis, NO_DATA_SYNOPSIS);

        // Previously incomplete: always regenerate.
        assert!(needs_summary(false, Some(&real)));
        // Complete but no summary yet.
        assert!(needs_summary(true, None));
        // Complete but only a placeholder.
        assert!(needs_summary(true, Some(&sentinel)));
        // Complete with a real summary: leave it alone.
        assert!(!needs_summary(true, Some(&real)));
    }
}
