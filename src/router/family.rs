//! Model family normalization.
//!
//! Providers report the concrete dated variant that served a request
//! (e.g. `gpt-4o-2024-08-06`). Telemetry and routing both need the stable
//! base identity, so normalization is a pure function kept separate from
//! dispatch: strip version/date suffixes, then match against the known
//! catalog.

use serde::{Serialize, Serializer};

/// A normalized model identity, ignoring version/date suffixes.
///
/// Known families carry pricing and context-window data in the telemetry
/// rate table; anything else falls into [`ModelFamily::Other`] and is
/// costed as unknown-rate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// The full-size gpt-4o family.
    Gpt4o,
    /// The gpt-4o-mini family.
    Gpt4oMini,
    /// The gpt-3.5-turbo family.
    Gpt35Turbo,
    /// Any family outside the known catalog, keyed by its stripped base name.
    Other(String),
}

impl ModelFamily {
    /// Normalize a concrete model identifier to its family.
    ///
    /// Deterministic: every dated variant of a base name maps to the same
    /// family, so a family is counted once in telemetry regardless of which
    /// variant actually served the request.
    pub fn normalize(identifier: &str) -> Self {
        let id = identifier.trim().to_lowercase();
        // Provider-prefixed identifiers ("openai:gpt-4o-mini") carry the
        // same base name after the prefix.
        let id = id.split_once(':').map(|(_, rest)| rest).unwrap_or(&id);
        let base = strip_version_suffix(id);

        // Longest known base first so "gpt-4o-mini" never matches "gpt-4o".
        match base {
            "gpt-4o-mini" => ModelFamily::Gpt4oMini,
            "gpt-4o" => ModelFamily::Gpt4o,
            "gpt-3.5-turbo" => ModelFamily::Gpt35Turbo,
            other => ModelFamily::Other(other.to_string()),
        }
    }

    /// Canonical family name.
    pub fn as_str(&self) -> &str {
        match self {
            ModelFamily::Gpt4o => "gpt-4o",
            ModelFamily::Gpt4oMini => "gpt-4o-mini",
            ModelFamily::Gpt35Turbo => "gpt-3.5-turbo",
            ModelFamily::Other(name) => name,
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ModelFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Strip trailing version segments from a model identifier.
///
/// A version segment is `latest` or a run of two or more digits
/// (`0125`, `2024`, `08`, `06`, `20241022`). Single digits stay: they are
/// part of the base name ("gpt-4").
fn strip_version_suffix(id: &str) -> &str {
    let mut end = id.len();
    loop {
        let trimmed = &id[..end];
        let Some(pos) = trimmed.rfind('-') else { break };
        let seg = &trimmed[pos + 1..];
        let is_version =
            seg == "latest" || (seg.len() >= 2 && seg.chars().all(|c| c.is_ascii_digit()));
        if !is_version {
            break;
        }
        end = pos;
    }
    &id[..end]
}
