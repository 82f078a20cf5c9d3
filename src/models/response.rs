//! Search response and facet models.

use serde::{Deserialize, Serialize};

use crate::models::{Document, Paging, Provider};

/// Error code for a successful response
pub const ERROR_NONE: i32 = 0;

/// Generic error code used when a vendor failure carried no numeric code
/// (non-success HTTP status, unparsable payload)
pub const ERROR_UNAVAILABLE: i32 = 1;

/// One (value, hit-count) pair inside a facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetItem {
    /// Filterable value
    pub value: String,

    /// Number of hits the vendor reports for this value
    pub hits: u64,
}

impl FacetItem {
    /// Create a new facet item
    pub fn new(value: impl Into<String>, hits: u64) -> Self {
        Self {
            value: value.into(),
            hits,
        }
    }
}

/// A named, enumerable filter dimension returned alongside results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    /// Vendor-agnostic facet name
    pub name: String,

    /// Value/count pairs
    pub items: Vec<FacetItem>,
}

impl Facet {
    /// Create a new facet
    pub fn new(name: impl Into<String>, items: Vec<FacetItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// Normalized response returned by every adapter for both search and
/// lookup-by-id.
///
/// Invariant: `error_code != 0` implies `docs` and `facets` are empty —
/// [`Response::reset`] discards anything collected before the failure so
/// callers never see partially-parsed vendor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Provider that served (or failed to serve) the request
    pub provider: Provider,

    /// Normalized documents
    pub docs: Vec<Document>,

    /// Facets offered by the vendor for narrowing
    pub facets: Vec<Facet>,

    /// Vendor-reported total hits (may exceed what is retrievable)
    pub total: u64,

    /// 0 on success; vendor error code or [`ERROR_UNAVAILABLE`] otherwise
    pub error_code: i32,

    /// Clamped paging state
    pub paging: Paging,
}

impl Response {
    /// Create a successful response
    pub fn new(
        provider: Provider,
        docs: Vec<Document>,
        facets: Vec<Facet>,
        total: u64,
        paging: Paging,
    ) -> Self {
        Self {
            provider,
            docs,
            facets,
            total,
            error_code: ERROR_NONE,
            paging,
        }
    }

    /// An empty but valid response (no hits, no error)
    pub fn empty(provider: Provider, per_page: u32) -> Self {
        Self::new(provider, Vec::new(), Vec::new(), 0, Paging::empty(per_page))
    }

    /// Degrade to an explicitly-empty error response.
    ///
    /// Used when the vendor reported a failure or the payload could not be
    /// parsed: whatever was collected so far is dropped so downstream code
    /// can render a "temporarily unavailable" state from a well-formed
    /// value.
    pub fn reset(provider: Provider, error_code: i32, per_page: u32) -> Self {
        let code = if error_code == ERROR_NONE {
            ERROR_UNAVAILABLE
        } else {
            error_code
        };
        Self {
            provider,
            docs: Vec::new(),
            facets: Vec::new(),
            total: 0,
            error_code: code,
            paging: Paging::empty(per_page),
        }
    }

    /// Whether the response is usable
    pub fn is_ok(&self) -> bool {
        self.error_code == ERROR_NONE
    }

    /// The single document of a lookup-by-id response, if any
    pub fn first(&self) -> Option<&Document> {
        self.docs.first()
    }
}
