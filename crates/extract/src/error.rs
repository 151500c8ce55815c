use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why an extraction produced no graph.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("model invocation failed: {0:#}")]
    ModelInvocation(anyhow::Error),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("no JSON-like structure in model output")]
    UnrecoverableStructure,

    #[error("could not parse model output (strict: {strict}; lenient: {lenient})")]
    ParseFailure { strict: String, lenient: String },

    #[error("parsed output is not a graph: {0}")]
    InvalidShape(String),
}

impl ExtractError {
    pub fn kind(&self) -> DegradeKind {
        match self {
            Self::ModelInvocation(_) | Self::Timeout(_) => DegradeKind::ModelInvocation,
            Self::UnrecoverableStructure => DegradeKind::UnrecoverableStructure,
            Self::ParseFailure { .. } | Self::InvalidShape(_) => DegradeKind::ParseFailure,
        }
    }
}

/// The failure kinds that collapse into an empty graph at the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradeKind {
    ModelInvocation,
    UnrecoverableStructure,
    ParseFailure,
    SearchUnavailable,
    NoSearchResults,
}

impl DegradeKind {
    pub const ALL: [DegradeKind; 5] = [
        DegradeKind::ModelInvocation,
        DegradeKind::UnrecoverableStructure,
        DegradeKind::ParseFailure,
        DegradeKind::SearchUnavailable,
        DegradeKind::NoSearchResults,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelInvocation => "model_invocation",
            Self::UnrecoverableStructure => "unrecoverable_structure",
            Self::ParseFailure => "parse_failure",
            Self::SearchUnavailable => "search_unavailable",
            Self::NoSearchResults => "no_search_results",
        }
    }
}

impl fmt::Display for DegradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
