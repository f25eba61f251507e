//! Coverage policy.
//!
//! A legal answer must rest on at least one legislation search plus one
//! search in another source. These functions read the coverage recorded
//! in [`AgentState`] and tell the planner when to override the model.

use super::heuristics::{
    generate_alternative_queries, keyword_query, legislation_query_candidates, normalize_query,
};
use super::state::{AgentState, ToolAction, ToolKind};
use crate::sources::SourceKind;

/// Legislation was searched at least once, and so was another source.
pub fn is_coverage_sufficient(state: &AgentState) -> bool {
    let coverage = &state.search_coverage;
    coverage.query_count(SourceKind::Legislation) >= 1
        && (coverage.query_count(SourceKind::Rag) >= 1
            || coverage.query_count(SourceKind::Jurisprudence) >= 1)
}

/// Legislation was never searched while another source already was.
pub fn should_force_source(state: &AgentState) -> bool {
    let coverage = &state.search_coverage;
    coverage.query_count(SourceKind::Legislation) == 0
        && (coverage.query_count(SourceKind::Rag) >= 1
            || coverage.query_count(SourceKind::Jurisprudence) >= 1)
}

/// Hint for the planner about which source to search next.
pub fn suggest_next_search(state: &AgentState) -> String {
    let coverage = &state.search_coverage;
    let legislation = coverage.query_count(SourceKind::Legislation);
    let jurisprudence = coverage.query_count(SourceKind::Jurisprudence);
    let rag = coverage.query_count(SourceKind::Rag);

    if legislation == 0 && jurisprudence == 0 && rag == 0 {
        return if state.has_collection() {
            "Start with the user's documents (rag) to understand the facts, then search legislation."
                .to_string()
        } else {
            "Start with legislation to find the governing provisions, then look for jurisprudence."
                .to_string()
        };
    }
    if legislation == 0 {
        return match forced_legislation_query(state) {
            Some(query) => format!(
                "REQUIRED: search legislation now. Suggested query: \"{}\".",
                query
            ),
            None => "REQUIRED: search legislation now.".to_string(),
        };
    }
    if jurisprudence == 0 {
        return "Legislation is covered. Search jurisprudence to see how courts apply it."
            .to_string();
    }
    if state.has_collection() && rag == 0 {
        return "Check the user's documents (rag) for the facts of the case.".to_string();
    }
    if coverage.legislation_results + coverage.jurisprudence_results + coverage.rag_results == 0 {
        return "Every source was searched without results. Try one of the suggested alternatives, or give the final answer."
            .to_string();
    }
    "Coverage is sufficient. Refine with a more specific angle or give the final answer."
        .to_string()
}

/// The legislation query used when the policy overrides the planner.
///
/// Candidates come in this order: references extracted from the question,
/// alternatives attached to failed legislation searches, the keyword form
/// of the question, its narrower keyword forms, the question itself. The
/// first one never searched in legislation wins; `None` once all were.
pub fn forced_legislation_query(state: &AgentState) -> Option<String> {
    let searched: Vec<String> = state
        .search_coverage
        .queries(SourceKind::Legislation)
        .iter()
        .map(|query| normalize_query(query))
        .collect();
    let failed_alternatives = state
        .failed_searches
        .iter()
        .filter(|failed| failed.tool == SourceKind::Legislation)
        .flat_map(|failed| failed.alternatives.iter().cloned());

    legislation_query_candidates(&state.query)
        .into_iter()
        .chain(failed_alternatives)
        .chain(std::iter::once(keyword_query(&state.query)))
        .chain(generate_alternative_queries(
            &state.query,
            SourceKind::Legislation,
        ))
        .chain(std::iter::once(state.query.trim().to_string()))
        .map(|candidate| candidate.trim().to_string())
        .find(|candidate| {
            !candidate.is_empty() && !searched.contains(&normalize_query(candidate))
        })
}

/// The action that replaces the planner's choice when legislation must be
/// searched, or `None` when every legislation fallback was already tried.
pub fn forced_legislation_action(state: &AgentState) -> Option<ToolAction> {
    forced_legislation_query(state).map(|query| {
        ToolAction::search(
            ToolKind::Legislation,
            query,
            "Legislation must be searched at least once before answering",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::FailedSearch;
    use pretty_assertions::assert_eq;

    fn state_with(query: &str, collection: bool) -> AgentState {
        AgentState::new(
            query,
            "user-1",
            collection.then(|| "col-1".to_string()),
            None,
            15,
        )
    }

    #[test]
    fn test_empty_coverage() {
        let state = state_with("bail", false);
        assert!(!is_coverage_sufficient(&state));
        assert!(!should_force_source(&state));
    }

    #[test]
    fn test_legislation_alone_is_not_sufficient() {
        let mut state = state_with("bail", false);
        state
            .search_coverage
            .record_query(SourceKind::Legislation, "bail");
        assert!(!is_coverage_sufficient(&state));
        assert!(!should_force_source(&state));
    }

    #[test]
    fn test_other_source_without_legislation_forces() {
        for source in [SourceKind::Rag, SourceKind::Jurisprudence] {
            let mut state = state_with("bail", true);
            state.search_coverage.record_query(source, "bail");
            assert!(!is_coverage_sufficient(&state));
            assert!(should_force_source(&state));
        }
    }

    #[test]
    fn test_sufficient_coverage() {
        let mut state = state_with("bail", false);
        state
            .search_coverage
            .record_query(SourceKind::Jurisprudence, "bail");
        state
            .search_coverage
            .record_query(SourceKind::Legislation, "bail");
        assert!(is_coverage_sufficient(&state));
        assert!(!should_force_source(&state));
    }

    #[test]
    fn test_suggest_next_search() {
        let mut state = state_with("article 591 Code judiciaire", false);
        assert!(suggest_next_search(&state).contains("Start with legislation"));

        state
            .search_coverage
            .record_query(SourceKind::Jurisprudence, "compétence");
        let hint = suggest_next_search(&state);
        assert!(hint.starts_with("REQUIRED"));
        assert!(hint.contains("article 591 Code judiciaire"));

        state
            .search_coverage
            .record_query(SourceKind::Legislation, "article 591 Code judiciaire");
        assert!(suggest_next_search(&state).contains("without results"));

        state.search_coverage.add_results(SourceKind::Legislation, 2);
        assert!(suggest_next_search(&state).contains("sufficient"));
    }

    #[test]
    fn test_suggest_rag_first_with_collection() {
        let state = state_with("bail", true);
        assert!(suggest_next_search(&state).contains("rag"));
    }

    #[test]
    fn test_forced_query_skips_already_searched() {
        let mut state = state_with("article 591 du Code judiciaire", false);
        assert_eq!(
            forced_legislation_query(&state).as_deref(),
            Some("article 591 Code judiciaire")
        );

        state
            .search_coverage
            .record_query(SourceKind::Legislation, "article 591 Code judiciaire");
        assert_eq!(
            forced_legislation_query(&state).as_deref(),
            Some("Code judiciaire")
        );
    }

    #[test]
    fn test_forced_query_falls_back_to_keywords() {
        let state = state_with("Quels sont mes droits ?", false);
        assert_eq!(forced_legislation_query(&state).as_deref(), Some("droits"));
    }

    #[test]
    fn test_forced_query_never_repeats_keyword_form() {
        let mut state = state_with("Qui paie le précompte immobilier ?", false);
        let mut issued = Vec::new();
        while let Some(query) = forced_legislation_query(&state) {
            assert!(!issued.contains(&query), "{query} issued twice");
            state
                .search_coverage
                .record_query(SourceKind::Legislation, &query);
            issued.push(query);
        }
        assert_eq!(issued[0], "paie précompte immobilier");
        assert!(issued.contains(&"précompte immobilier".to_string()));
        assert!(issued.len() > 2);
    }

    #[test]
    fn test_forced_query_uses_failed_alternatives() {
        let mut state = state_with("Qui paie le précompte immobilier ?", false);
        state
            .search_coverage
            .record_query(SourceKind::Legislation, "paie précompte immobilier");
        state.failed_searches.push(FailedSearch {
            tool: SourceKind::Legislation,
            query: "paie précompte immobilier".to_string(),
            reason: "no results".to_string(),
            alternatives: vec!["précompte immobilier Région wallonne".to_string()],
        });
        assert_eq!(
            forced_legislation_query(&state).as_deref(),
            Some("précompte immobilier Région wallonne")
        );
    }

    #[test]
    fn test_forced_query_ignores_case_and_spacing() {
        let mut state = state_with("Quels sont mes droits ?", false);
        for query in ["DROITS", "Quels  sont mes droits ?"] {
            state
                .search_coverage
                .record_query(SourceKind::Legislation, query);
        }
        assert_eq!(forced_legislation_query(&state), None);
        assert!(forced_legislation_action(&state).is_none());
    }

    #[test]
    fn test_forced_action_is_legislation() {
        let state = state_with("article 1382 Code civil", false);
        let action = forced_legislation_action(&state).unwrap();
        assert_eq!(action.tool, ToolKind::Legislation);
        assert_eq!(action.query(), Some("article 1382 Code civil"));
    }
}
