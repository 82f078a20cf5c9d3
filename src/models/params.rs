//! Provider-agnostic search parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inclusive date-range bounds for a search, as entered by the caller
/// (years or `YYYY-MM` style values; each adapter renders its own vendor
/// syntax via `Engine::date_format`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Lower bound
    pub from: Option<String>,

    /// Upper bound
    pub to: Option<String>,
}

impl DateRange {
    /// Create a fully-bounded range
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    /// Whether neither bound is set
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Generic search/lookup parameters translated by each adapter's param
/// builder into vendor query syntax.
///
/// All request state lives here (or in the explicitly-passed session) —
/// adapters hold no per-request fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query
    pub query: String,

    /// Generic search-field name ("title", "author", "subject", ...);
    /// unmapped or absent fields fall back to the vendor's everything-field
    pub field: Option<String>,

    /// Facet-field name -> selected values
    pub facets: HashMap<String, Vec<String>>,

    /// Generic sort key ("relevance", "date"); vendor default when absent
    pub sort: Option<String>,

    /// 1-based page
    pub page: u32,

    /// Results per page
    pub per_page: u32,

    /// Absolute 1-based result position for single-item fetches. When set,
    /// adapters derive the page themselves and return exactly one document.
    pub index: Option<u64>,

    /// Publication date bounds
    pub date_range: Option<DateRange>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            field: None,
            facets: HashMap::new(),
            sort: None,
            page: 1,
            per_page: 10,
            index: None,
            date_range: None,
        }
    }
}

impl SearchParams {
    /// Create parameters for a free-text query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the generic search-field name
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add a selected facet value
    pub fn facet(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set the sort key
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set page and per-page together
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.max(1);
        self
    }

    /// Request a single document by absolute 1-based position
    pub fn index(mut self, index: u64) -> Self {
        self.index = Some(index.max(1));
        self
    }

    /// Set date-range bounds
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// 0-based offset of the first requested result, honoring `index`
    /// when present
    pub fn start_index(&self) -> u64 {
        match self.index {
            Some(index) => index.saturating_sub(1),
            None => u64::from(self.page.max(1) - 1) * u64::from(self.per_page),
        }
    }
}
