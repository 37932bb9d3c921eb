//! Transcript-backed context source.
//!
//! The bounded document/transcript the session answers over, exposed as a
//! [`ContextSource`]. Relevance is a naive term-overlap scan over lines;
//! good enough for the CLI, and the trait seam keeps real retrieval
//! pluggable.

use async_trait::async_trait;
use tracing::debug;

use super::ContextSource;
use crate::error::AppResult;

/// How many of the best-scoring lines a lookup returns.
const MAX_EXCERPT_LINES: usize = 8;

/// In-memory transcript scored line-by-line against the query.
pub struct TranscriptSource {
    lines: Vec<String>,
}

impl TranscriptSource {
    /// Build a source from raw transcript text.
    pub fn new(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Number of indexed lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the transcript holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn score(query_terms: &[String], line: &str) -> usize {
        let line_lower = line.to_lowercase();
        query_terms
            .iter()
            .filter(|term| line_lower.contains(term.as_str()))
            .count()
    }
}

#[async_trait]
impl ContextSource for TranscriptSource {
    async fn lookup(&self, query: &str, _scope: &str) -> AppResult<Option<String>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(String::from)
            .collect();

        if terms.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(usize, &String)> = self
            .lines
            .iter()
            .map(|line| (Self::score(&terms, line), line))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        if scored.is_empty() {
            return Ok(None);
        }

        let excerpt = scored
            .iter()
            .take(MAX_EXCERPT_LINES)
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            matched = scored.len(),
            returned = scored.len().min(MAX_EXCERPT_LINES),
            "Transcript lookup matched lines"
        );

        Ok(Some(excerpt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "\
Alice: the deploy failed on Tuesday because of the expired certificate
Bob: we rotated the certificate on Wednesday morning
Alice: latency went back to normal after the rotation
Bob: the postmortem is scheduled for Friday";

    #[tokio::test]
    async fn test_lookup_finds_relevant_lines() {
        let source = TranscriptSource::new(TRANSCRIPT);

        let result = source
            .lookup("why did the deploy fail?", "meeting")
            .await
            .unwrap();

        let excerpt = result.expect("expected a match");
        assert!(excerpt.contains("deploy failed"));
    }

    #[tokio::test]
    async fn test_lookup_without_match_returns_none() {
        let source = TranscriptSource::new(TRANSCRIPT);

        let result = source.lookup("quarterly revenue", "meeting").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_short_terms_are_ignored() {
        let source = TranscriptSource::new(TRANSCRIPT);

        // Every term is <= 2 chars, so nothing to score on.
        let result = source.lookup("is it on?", "meeting").await.unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let source = TranscriptSource::new("a line\n\n   \nanother line\n");
        assert_eq!(source.len(), 2);
    }
}
