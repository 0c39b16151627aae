use std::collections::BTreeMap;

use pulsepoint_common::ResultRecord;

/// Flatten normalized results into the corpus text handed to the
/// summarizer: one block per source in catalog order, each item rendered as
/// Title/Content/URL lines. Downstream prompt design depends on this exact
/// shape — treat it as a wire format.
pub fn aggregate_corpus(
    results: &BTreeMap<String, Vec<ResultRecord>>,
    source_order: &[&str],
) -> String {
    let mut corpus = String::new();

    let ordered = source_order
        .iter()
        .copied()
        .chain(
            // Sources outside the catalog order still contribute,
            // deterministically, after the known ones.
            results
                .keys()
                .map(String::as_str)
                .filter(|s| !source_order.contains(s)),
        );

    for source in ordered {
        let Some(items) = results.get(source) else {
            continue;
        };
        if items.is_empty() {
            continue;
        }
        corpus.push_str(&format!("=== {} ===\n", source.to_uppercase()));
        for item in items {
            corpus.push_str(&format!("Title: {}\n", item.title));
            corpus.push_str(&format!("Content: {}\n", item.snippet));
            corpus.push_str(&format!("URL: {}\n\n", item.url));
        }
    }

    corpus
}
