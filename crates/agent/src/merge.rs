//! Combining the per-choice results of a forced-tool round.

use roundtable_core::backend::CompletionResult;

/// Merge per-choice results, given in forced-choice order.
///
/// Tool calls and references are concatenated in that order. The message
/// body is taken from the first result only: the forced calls share one
/// logical turn upstream, so the other bodies are dropped on purpose.
///
/// The merged message carries the merged tool calls, so it never disagrees
/// with `tool_calls`. Returns `None` when there is nothing to merge.
pub fn merge_forced_results(results: Vec<CompletionResult>) -> Option<CompletionResult> {
    let mut results = results.into_iter();
    let first = results.next()?;

    let mut merged = CompletionResult {
        message: first.message,
        tool_calls: first.tool_calls,
        references: first.references,
    };

    for result in results {
        merged.tool_calls.extend(result.tool_calls);
        merged.references.extend(result.references);
    }
    merged.message.tool_calls = merged.tool_calls.clone();

    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{tool_call, tool_call_result};
    use roundtable_core::backend::Reference;

    #[test]
    fn empty_input_merges_to_nothing() {
        assert!(merge_forced_results(vec![]).is_none());
    }

    #[test]
    fn concatenates_in_input_order() {
        let merged = merge_forced_results(vec![
            tool_call_result("first", vec![tool_call("a1", "alpha"), tool_call("a2", "alpha")])
                .with_references(vec![Reference::new("r-a")]),
            tool_call_result("second", vec![tool_call("b1", "beta")])
                .with_references(vec![Reference::new("r-b")]),
        ])
        .unwrap();

        let ids: Vec<_> = merged.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2", "b1"]);
        let refs: Vec<_> = merged.references.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(refs, ["r-a", "r-b"]);
    }

    #[test]
    fn message_comes_from_first_result_only() {
        let merged = merge_forced_results(vec![
            tool_call_result("first body", vec![]),
            tool_call_result("second body", vec![tool_call("b1", "beta")]),
        ])
        .unwrap();
        assert_eq!(merged.message.text(), "first body");
        assert_eq!(merged.tool_calls.len(), 1);
    }

    #[test]
    fn message_tool_calls_match_merged_list() {
        let mut first = tool_call_result("body", vec![tool_call("a1", "alpha")]);
        first.message.tool_calls = vec![tool_call("stale", "alpha")];
        let mut second = tool_call_result("", vec![tool_call("b1", "beta")]);
        second.message.tool_calls = vec![tool_call("b1", "beta")];

        let merged = merge_forced_results(vec![first, second]).unwrap();
        assert_eq!(merged.message.tool_calls, merged.tool_calls);
        let ids: Vec<_> = merged.message.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a1", "b1"]);
    }

    #[test]
    fn no_tool_calls_stays_empty() {
        let merged = merge_forced_results(vec![
            CompletionResult::text("a"),
            CompletionResult::text("b").with_references(vec![Reference::new("cite")]),
        ])
        .unwrap();
        assert!(merged.tool_calls.is_empty());
        assert!(merged.message.tool_calls.is_empty());
        assert!(!merged.has_tool_calls());
        assert_eq!(merged.references.len(), 1);
    }
}
