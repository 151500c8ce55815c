use std::time::Duration;
use thiserror::Error;

use extract::{DegradeKind, ExtractError};

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("web search failed: {0:#}")]
    Search(anyhow::Error),

    #[error("web search timed out after {0:?}")]
    SearchTimeout(Duration),

    #[error("web search returned no results")]
    NoResults,

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl ExpandError {
    pub fn kind(&self) -> DegradeKind {
        match self {
            Self::Search(_) | Self::SearchTimeout(_) => DegradeKind::SearchUnavailable,
            Self::NoResults => DegradeKind::NoSearchResults,
            Self::Extract(e) => e.kind(),
        }
    }
}
