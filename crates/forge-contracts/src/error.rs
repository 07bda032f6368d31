use thiserror::Error;

/// Failure taxonomy shared by the engine and its callers.
///
/// Only `Decode` and `Encode` are ever returned directly (by the image
/// normalizer). Upstream variants travel inside `anyhow` chains from the
/// provider clients and are classified at the stage boundary.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("sprite encode failed: {0}")]
    Encode(String),

    #[error("{provider} transport failed: {message}")]
    UpstreamTransport { provider: String, message: String },

    #[error("{provider} returned malformed output: {message}")]
    UpstreamMalformed { provider: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ForgeError {
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamTransport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamMalformed {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Coarse classification of a failed stage, recorded with its fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Decode,
    UpstreamTransport,
    UpstreamMalformed,
    /// Local setup, such as a missing API key; no request was sent.
    Config,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::UpstreamTransport => "upstream_transport",
            Self::UpstreamMalformed => "upstream_malformed",
            Self::Config => "config",
        }
    }
}

impl From<&ForgeError> for FailureKind {
    fn from(err: &ForgeError) -> Self {
        match err {
            ForgeError::Decode(_) | ForgeError::Encode(_) => Self::Decode,
            ForgeError::UpstreamTransport { .. } => Self::UpstreamTransport,
            ForgeError::UpstreamMalformed { .. } => Self::UpstreamMalformed,
            ForgeError::Config(_) => Self::Config,
        }
    }
}
