//! Utility modules supporting the provider adapters.
//!
//! - [`HttpClient`]: reqwest wrapper with fixed read/connect timeouts
//! - [`rewrite_markup`] / [`sanitize_html`] / [`sanitize_fulltext`]:
//!   EBSCO full-text dialect rewriting and allow-list sanitization
//! - [`strip_tags`]: plain-text extraction for display fields

mod http;
mod sanitize;

pub use http::HttpClient;
pub use sanitize::{rewrite_markup, sanitize_fulltext, sanitize_html, strip_tags};
