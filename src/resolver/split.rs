//! Complexity estimation and query splitting.
//!
//! Both are local heuristics, never model calls, so call accounting stays
//! exact: a query is only as expensive as the sub-queries it produces.
//! Splitting segments on question marks first, then semicolons, then
//! clause-leading conjunctions; a conjunction only breaks a clause when the
//! word after it starts a new question ("... and summarize the risks"),
//! which keeps compound subjects like "X and Y" intact.

/// Words that start a new question clause after a conjunction.
const CLAUSE_LEADS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "compare", "contrast", "summarize",
    "summarise", "list", "explain", "describe", "assess", "evaluate", "identify", "outline",
    "analyze", "analyse", "estimate", "recommend",
];

/// Markers that flag a comparison or multi-part request.
const MULTIPART_MARKERS: &[&str] = &[
    "compare",
    "contrast",
    " versus ",
    " vs ",
    "difference between",
    "pros and cons",
    "trade-off",
    "tradeoff",
];

/// Estimate query complexity in [0, 1].
///
/// Length, extra question clauses, multi-part markers, and enumerations
/// each contribute; the dominant signal is whether the splitter can
/// actually segment the query.
pub fn complexity_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;

    let len = trimmed.chars().count();
    if len >= 200 {
        score += 0.4;
    } else if len >= 100 {
        score += 0.2;
    }

    let questions = trimmed.matches('?').count();
    if questions > 1 {
        score += 0.3 * (questions - 1) as f64;
    }

    if trimmed.contains(';') {
        score += 0.2;
    }

    let lower = trimmed.to_lowercase();
    if MULTIPART_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 0.2;
    }

    if has_enumeration(trimmed) {
        score += 0.3;
    }

    if split_query(trimmed).len() >= 2 {
        score += 0.4;
    }

    score.min(1.0)
}

/// Split a query into an ordered list of sub-queries.
///
/// Returns the original query as a single element when no split applies;
/// callers treat a one-element result as "answer directly".
pub fn split_query(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return vec![String::new()];
    }

    let questions = split_on_questions(trimmed);
    if questions.len() >= 2 {
        return questions;
    }

    let clauses = split_on_char(trimmed, ';');
    if clauses.len() >= 2 {
        return clauses;
    }

    let conjuncts = split_on_conjunctions(trimmed);
    if conjuncts.len() >= 2 {
        return conjuncts;
    }

    vec![trimmed.to_string()]
}

fn split_on_questions(text: &str) -> Vec<String> {
    text.split('?')
        .map(str::trim)
        .filter(|part| part.chars().count() > 3)
        .map(|part| format!("{}?", part))
        .collect()
}

fn split_on_char(text: &str, separator: char) -> Vec<String> {
    text.split(separator)
        .map(str::trim)
        .filter(|part| part.chars().count() > 3)
        .map(String::from)
        .collect()
}

fn split_on_conjunctions(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = find_clause_break(rest) {
        parts.push(rest[..at].trim().to_string());
        rest = &rest[at + " and ".len()..];
    }
    parts.push(rest.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Find the byte offset of a `" and "` that introduces a new clause, i.e.
/// one followed by a clause-leading word.
fn find_clause_break(text: &str) -> Option<usize> {
    let needle = " and ";
    let mut from = 0;
    while let Some(i) = text[from..].find(needle) {
        let at = from + i;
        let after = &text[at + needle.len()..];
        let next_word: String = after
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        if CLAUSE_LEADS.contains(&next_word.as_str()) {
            return Some(at);
        }
        from = at + needle.len();
    }
    None
}

fn has_enumeration(text: &str) -> bool {
    (text.contains("1.") && text.contains("2."))
        || (text.contains("(a)") && text.contains("(b)"))
        || (text.contains("first") && text.contains("second"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_question_scores_low() {
        assert!(complexity_score("What is the capital of France?") < 0.5);
        assert!(complexity_score("Who rotated the certificate?") < 0.5);
    }

    #[test]
    fn test_compound_request_scores_high() {
        assert!(complexity_score("Compare X and Y and summarize risks") > 0.5);
    }

    #[test]
    fn test_multiple_questions_score_high() {
        let text = "What failed on Tuesday? Who fixed it? When is the postmortem?";
        assert!(complexity_score(text) > 0.5);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(complexity_score("   "), 0.0);
    }

    #[test]
    fn test_split_on_question_marks() {
        let parts = split_query("What failed on Tuesday? Who fixed it?");
        assert_eq!(
            parts,
            vec!["What failed on Tuesday?", "Who fixed it?"]
        );
    }

    #[test]
    fn test_split_on_semicolons() {
        let parts = split_query("list the incidents; describe the fixes");
        assert_eq!(parts, vec!["list the incidents", "describe the fixes"]);
    }

    #[test]
    fn test_split_keeps_compound_subjects_together() {
        let parts = split_query("Compare X and Y and summarize risks");
        assert_eq!(parts, vec!["Compare X and Y", "summarize risks"]);
    }

    #[test]
    fn test_no_split_for_simple_query() {
        let parts = split_query("What is the capital of France?");
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_conjunction_without_clause_lead_does_not_split() {
        let parts = split_query("What happened to Alice and Bob");
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_split_order_is_original_order() {
        let parts = split_query("explain the outage and estimate the impact and recommend fixes");
        assert_eq!(
            parts,
            vec![
                "explain the outage",
                "estimate the impact",
                "recommend fixes"
            ]
        );
    }
}
