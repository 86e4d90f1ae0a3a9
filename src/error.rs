// =============================================================================
// Error taxonomy for the acquisition pipeline
// =============================================================================
//
// Fetch errors collapse to a single "fall back to cache" action at the poller
// boundary, but keep their kind so the logs say what actually went wrong.
// Cache errors are split so that an unresolvable endpoint name can be logged
// loudly instead of being mistaken for a missing or corrupt file.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`FetchError`], used in log fields and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Upstream,
    Parse,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Upstream => write!(f, "upstream"),
            Self::Parse => write!(f, "parse"),
        }
    }
}

/// Failure while fetching or decoding one upstream response.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout, or unreadable body.
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The exchange answered with a non-success status.
    #[error("{url} returned status {status}: {body}")]
    Upstream {
        url: String,
        status: u16,
        body: String,
    },

    /// The body was not the JSON shape we expect.
    #[error("malformed {what}: {reason}")]
    Parse { what: &'static str, reason: String },
}

impl FetchError {
    pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            what,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } => FetchErrorKind::Network,
            Self::Upstream { .. } => FetchErrorKind::Upstream,
            Self::Parse { .. } => FetchErrorKind::Parse,
        }
    }
}

/// Failure while reading a persisted quote back from disk.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No record has ever been written for this symbol.
    #[error("no cache record at {path}")]
    NotFound { path: PathBuf },

    /// The file exists but is not a valid record.
    #[error("cache record at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The record names an endpoint that is no longer configured.
    #[error("cache record at {path} references unknown endpoint '{name}'")]
    DescriptorNotFound { path: PathBuf, name: String },

    #[error("cache i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration validation and endpoint lookup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one endpoint must be configured")]
    NoEndpoints,

    #[error("endpoint '{name}' is configured more than once")]
    DuplicateEndpoint { name: String },

    #[error("endpoint '{name}' is not configured")]
    DescriptorNotFound { name: String },

    #[error("invalid symbol '{value}': {reason}")]
    InvalidSymbol { value: String, reason: &'static str },

    #[error("symbol '{ticker}' is configured more than once")]
    DuplicateSymbol { ticker: String },

    #[error("field '{field}' must be greater than zero")]
    Zero { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_kind_matches_variant() {
        let err = FetchError::Upstream {
            url: "https://x.test/a".into(),
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.kind(), FetchErrorKind::Upstream);
        assert_eq!(
            FetchError::parse("price", "missing").kind(),
            FetchErrorKind::Parse
        );
    }

    #[test]
    fn descriptor_not_found_message_names_endpoint() {
        let err = CacheError::DescriptorNotFound {
            path: PathBuf::from("BTC_cache.json"),
            name: "Kraken".into(),
        };
        assert!(err.to_string().contains("'Kraken'"));
    }
}
