//! Continuity engine: rolling summary construction and ledger merge
//! (spec §4.7). Grounded line-for-line on the original's
//! `continuity.py` constants.

use std::collections::BTreeMap;

use crate::state::SummaryRecord;

pub const TOKENS_PER_WORD: f64 = 1.33;
pub const ROLLING_SUMMARY_MIN_TOKENS: u32 = 400;
pub const ROLLING_SUMMARY_MAX_TOKENS: u32 = 900;

fn estimate_tokens(text: &str) -> u32 {
    let word_count = text.split_whitespace().count();
    (word_count as f64 * TOKENS_PER_WORD) as u32
}

/// Walks `summaries` from newest to oldest, accumulating until the token
/// estimate falls between `target_min_tokens` and `ROLLING_SUMMARY_MAX_TOKENS`.
/// Emits the selected summaries in chronological order, each prefixed
/// `Section NN: `.
pub fn build_rolling_summary(summaries: &[SummaryRecord], target_min_tokens: u32) -> String {
    if summaries.is_empty() {
        return "No previous sections.".to_string();
    }

    let mut selected: Vec<&SummaryRecord> = Vec::new();
    let mut total_tokens: u32 = 0;

    for summary in summaries.iter().rev() {
        let tokens = estimate_tokens(&summary.summary);

        if total_tokens + tokens > ROLLING_SUMMARY_MAX_TOKENS {
            break;
        }

        selected.insert(0, summary);
        total_tokens += tokens;

        if total_tokens >= target_min_tokens && selected.len() >= 2 {
            break;
        }
    }

    if selected.is_empty() {
        return "No previous sections.".to_string();
    }

    selected
        .iter()
        .map(|s| format!("Section {:02}: {}", s.section_id, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Shallow merge; keys present in both resolve to the `updates` value
/// (last write wins). Returns a new ledger; does not mutate the input.
pub fn merge_continuity_updates(
    ledger: &BTreeMap<String, String>,
    updates: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = ledger.clone();
    for (k, v) in updates {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Human-readable bullet list sorted by key; empty ledger yields a placeholder.
pub fn get_continuity_context(ledger: &BTreeMap<String, String>) -> String {
    if ledger.is_empty() {
        return "No continuity information available.".to_string();
    }
    ledger
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(section_id: u32, text: &str) -> SummaryRecord {
        SummaryRecord {
            section_id,
            summary: text.to_string(),
            continuity_updates: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_summaries_yield_placeholder() {
        assert_eq!(
            build_rolling_summary(&[], ROLLING_SUMMARY_MIN_TOKENS),
            "No previous sections."
        );
    }

    #[test]
    fn selected_summaries_stay_chronological() {
        let summaries = vec![
            summary(1, &"word ".repeat(50)),
            summary(2, &"word ".repeat(50)),
            summary(3, &"word ".repeat(50)),
        ];
        let rolling = build_rolling_summary(&summaries, ROLLING_SUMMARY_MIN_TOKENS);
        let pos1 = rolling.find("Section 01").unwrap();
        let pos3 = rolling.find("Section 03").unwrap();
        assert!(pos1 < pos3);
    }

    #[test]
    fn stops_once_minimum_and_two_sections_met() {
        // Each summary ~ 300 tokens (225 words * 1.33). Two should clear the 400 floor.
        let summaries = vec![
            summary(1, &"word ".repeat(225)),
            summary(2, &"word ".repeat(225)),
            summary(3, &"word ".repeat(225)),
        ];
        let rolling = build_rolling_summary(&summaries, ROLLING_SUMMARY_MIN_TOKENS);
        assert!(!rolling.contains("Section 01"));
        assert!(rolling.contains("Section 02"));
        assert!(rolling.contains("Section 03"));
    }

    #[test]
    fn merge_is_idempotent() {
        let ledger: BTreeMap<String, String> =
            [("k".to_string(), "v1".to_string())].into_iter().collect();
        let updates: BTreeMap<String, String> =
            [("k".to_string(), "v2".to_string())].into_iter().collect();

        let once = merge_continuity_updates(&ledger, &updates);
        let twice = merge_continuity_updates(&once, &updates);
        assert_eq!(once, twice);
    }

    #[test]
    fn last_write_wins() {
        let ledger: BTreeMap<String, String> =
            [("k".to_string(), "old".to_string())].into_iter().collect();
        let updates: BTreeMap<String, String> =
            [("k".to_string(), "new".to_string())].into_iter().collect();
        let merged = merge_continuity_updates(&ledger, &updates);
        assert_eq!(merged["k"], "new");
    }

    #[test]
    fn empty_ledger_yields_placeholder() {
        assert_eq!(
            get_continuity_context(&BTreeMap::new()),
            "No continuity information available."
        );
    }

    #[test]
    fn ledger_context_sorted_by_key() {
        let ledger: BTreeMap<String, String> = [
            ("zebra".to_string(), "z".to_string()),
            ("alpha".to_string(), "a".to_string()),
        ]
        .into_iter()
        .collect();
        let context = get_continuity_context(&ledger);
        assert_eq!(context, "- alpha: a\n- zebra: z");
    }
}
