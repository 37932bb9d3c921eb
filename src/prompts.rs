//! Prompt constants and answer-assembly templates.

/// System prompt for direct answering over retrieved context.
pub const DIRECT_ANSWER_PROMPT: &str = "\
You answer questions about a bounded document or transcript. Ground every \
claim in the context excerpt when one is provided. If the context does not \
contain the answer, say so briefly instead of guessing. Be concise.";

/// Build the user prompt for a direct answer, with optional context.
pub fn direct_prompt(question: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => format!(
            "Context:\n{}\n\nQuestion: {}",
            context, question
        ),
        None => format!("Question: {}", question),
    }
}

/// One sub-query's slot in a merged answer. `answer` is `None` when the
/// sub-query failed and a gap placeholder should be rendered instead.
#[derive(Debug, Clone)]
pub struct MergeSection {
    /// The sub-query text.
    pub question: String,
    /// The sub-answer, if the sub-query succeeded.
    pub answer: Option<String>,
}

/// Merge sub-answers into the parent answer, preserving original order.
/// Failed sections become explicit gap placeholders; no re-ranking.
pub fn merge_answer(sections: &[MergeSection]) -> String {
    let mut out = String::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        match &section.answer {
            Some(answer) => {
                out.push_str(&format!("{}. {}\n{}", i + 1, section.question, answer));
            }
            None => {
                out.push_str(&format!(
                    "{}. {}\n[no answer available for this part]",
                    i + 1,
                    section.question
                ));
            }
        }
    }
    out
}
