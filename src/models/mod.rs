//! Core data models shared across provider adapters.

mod document;
mod paging;
mod params;
mod response;

pub use document::{Document, DocumentBuilder, FullText, Link, Provider};
pub use paging::{compute_paging, Paging};
pub use params::{DateRange, SearchParams};
pub use response::{Facet, FacetItem, Response, ERROR_NONE, ERROR_UNAVAILABLE};
