use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid url `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ResolverError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Failures while decoding a play info payload.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized play info layout")]
    UnrecognizedLayout,
}

/// Why a single candidate URL was dropped during classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("malformed candidate url `{url}`: {reason}")]
    Malformed { url: String, reason: String },
    #[error("unrecognized cdn url pattern: {0}")]
    Unrecognized(String),
}

impl CandidateError {
    pub fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
