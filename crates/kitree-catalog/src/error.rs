use thiserror::Error;

/// Failure of a catalog request.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{what} not found in catalog")]
    NotFound { what: String },

    #[error("IPN {ipn} matches {count} active parts, expected exactly one")]
    Ambiguous { ipn: String, count: usize },

    #[error("catalog at {domain} is unavailable: {reason}")]
    Unavailable { domain: String, reason: String },

    #[error("catalog request {url} failed with status {status}")]
    Http { status: u16, url: String },

    #[error("unexpected response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("transport error for {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CatalogError::NotFound { what: what.into() }
    }

    /// Whether this failure only concerns the requested item.
    ///
    /// `NotFound` and `Ambiguous` skip one unit of work; everything else
    /// means the catalog itself could not answer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound { .. } | CatalogError::Ambiguous { .. }
        )
    }
}
