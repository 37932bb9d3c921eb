use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors from the outbound reasoning-call collaborator.
///
/// The variants split into two camps the router cares about: retryable
/// (timeouts, rate limits, upstream outages) and fatal (auth, malformed
/// requests). See [`ProviderError::is_retryable`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Upstream error: {status} - {message}")]
    Upstream { status: u16, message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Malformed request: {message}")]
    Malformed { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether the router may retry this failure at the same tier and,
    /// after retries are exhausted, fall back a tier.
    ///
    /// Auth and malformed-request failures are never retried: repeating
    /// them cannot succeed, and the controller needs to see them as a node
    /// failure immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Upstream { .. } => true,
            ProviderError::Auth { .. } => false,
            ProviderError::Malformed { .. } => false,
            ProviderError::InvalidResponse { .. } => false,
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
        }
    }
}

/// Model router errors
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Configuration conflict: {message}")]
    ConfigConflict { message: String },

    #[error("All tiers exhausted after {attempts} attempts (requested {requested}): {last_error}")]
    TiersExhausted {
        requested: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Fatal provider error: {0}")]
    Fatal(#[source] ProviderError),
}

/// Decomposition controller errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Root query failed: {message}")]
    RootFailed { message: String },

    #[error("All {count} sub-queries failed")]
    AllChildrenFailed { count: usize },

    #[error("Resolution cancelled after {elapsed_ms}ms")]
    Cancelled { elapsed_ms: u64 },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for router operations
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");

        let err = ProviderError::Upstream {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream error: 503 - unavailable");

        let err = ProviderError::Auth {
            message: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "Authentication failed: bad key");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout { timeout_ms: 100 }.is_retryable());
        assert!(ProviderError::RateLimited {
            message: "slow down".to_string()
        }
        .is_retryable());
        assert!(ProviderError::Upstream {
            status: 500,
            message: "boom".to_string()
        }
        .is_retryable());

        assert!(!ProviderError::Auth {
            message: "denied".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::Malformed {
            message: "bad body".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::InvalidResponse {
            message: "not json".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_router_error_display() {
        let err = RouterError::ConfigConflict {
            message: "effort and temperature both set".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration conflict: effort and temperature both set"
        );

        let err = RouterError::TiersExhausted {
            requested: "deep".to_string(),
            attempts: 9,
            last_error: "timeout".to_string(),
        };
        assert!(err.to_string().contains("deep"));
        assert!(err.to_string().contains("9 attempts"));
    }

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::Validation {
            field: "query".to_string(),
            reason: "cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "Validation failed: query - cannot be empty");

        let err = ResolveError::Cancelled { elapsed_ms: 1234 };
        assert_eq!(err.to_string(), "Resolution cancelled after 1234ms");
    }

    #[test]
    fn test_router_error_conversion_to_app_error() {
        let router_err = RouterError::ConfigConflict {
            message: "conflict".to_string(),
        };
        let app_err: AppError = router_err.into();
        assert!(matches!(app_err, AppError::Router(_)));
    }

    #[test]
    fn test_resolve_error_conversion_to_app_error() {
        let resolve_err = ResolveError::RootFailed {
            message: "all children failed".to_string(),
        };
        let app_err: AppError = resolve_err.into();
        assert!(matches!(app_err, AppError::Resolve(_)));
        assert!(app_err.to_string().contains("all children failed"));
    }
}
