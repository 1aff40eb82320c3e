use kitree_catalog::{CatalogError, PartId};
use kitree_sexpr::kicad::DocumentError;
use thiserror::Error;

/// Failure of a variant-chain lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{name} not found for {ipn} or any part it is a variant of")]
    NotFound { ipn: String, name: String },

    #[error("variant chain of {ipn} loops back onto itself")]
    Cycle { ipn: String },

    #[error("part {id} was never fetched from the catalog")]
    Unfetched { id: PartId },
}

/// Why one part was left out of a library build.
#[derive(Debug, Error)]
pub enum PartFailure {
    #[error("not available in catalog")]
    NotFound(#[source] CatalogError),

    #[error("{count} active parts share this IPN")]
    Ambiguous { count: usize },

    #[error("catalog request failed")]
    Catalog(#[source] CatalogError),

    #[error("no {tag} attachment")]
    MissingAsset {
        tag: &'static str,
        #[source]
        source: ResolveError,
    },

    #[error("downloading {tag} from {url} failed")]
    Download {
        tag: &'static str,
        url: String,
        #[source]
        source: CatalogError,
    },

    #[error("symbol file holds {count} symbols, expected exactly one")]
    MultipleSymbols { count: usize },

    #[error("malformed symbol: {reason}")]
    MalformedSymbol { reason: String },

    #[error("malformed {what}")]
    MalformedAsset {
        what: &'static str,
        #[source]
        source: DocumentError,
    },

    #[error("library id {id} is already used by {owner}")]
    DuplicateLibraryId { id: String, owner: String },

    #[error("writing {what} failed")]
    Write {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl From<CatalogError> for PartFailure {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Ambiguous { count, .. } => PartFailure::Ambiguous { count },
            err @ CatalogError::NotFound { .. } => PartFailure::NotFound(err),
            err => PartFailure::Catalog(err),
        }
    }
}
