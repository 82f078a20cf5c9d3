//! Provider engines with a trait-based adapter architecture.
//!
//! This module defines the [`Engine`] trait that every article-search
//! vendor adapter implements, the shared [`EngineError`] taxonomy, and the
//! [`EngineRegistry`] that selects one concrete adapter per configured
//! provider. Callers never branch on vendor identity: they pick an engine
//! once (by configuration) and use it polymorphically.
//!
//! # Adding a Provider
//!
//! 1. Create a struct holding the vendor config and the shared `HttpClient`
//! 2. Implement `Engine` (query building, transport, parsing into the
//!    canonical model, vendor error classification)
//! 3. Register it in [`EngineRegistry::from_config`]

mod ebsco;
mod primo;
mod registry;
mod summon;

pub mod mock;

pub use ebsco::{EbscoEngine, EbscoId};
pub use mock::MockEngine;
pub use primo::PrimoEngine;
pub use registry::EngineRegistry;
pub use summon::SummonEngine;

use async_trait::async_trait;

use crate::models::{Provider, Response, SearchParams, ERROR_UNAVAILABLE};

/// Which end of a date range a value anchors, so adapters can fill in the
/// missing precision (e.g. month) appropriately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateAnchor {
    Start,
    End,
}

/// An opaque vendor session credential.
///
/// Only EBSCO issues real tokens; the other adapters run sessionless and
/// use [`Session::none`]. The credential is always passed by value through
/// the call chain — it is never stored on the engine or in any shared
/// state, so one request's session cannot leak into another.
#[derive(Debug, Clone)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    /// A sessionless placeholder for providers without a handshake
    pub fn none() -> Self {
        Self { token: None }
    }

    /// Wrap a vendor-issued token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// The raw token, if this session carries one
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// The capability set every provider adapter exposes
#[async_trait]
pub trait Engine: Send + Sync + std::fmt::Debug {
    /// Vendor identity
    fn provider(&self) -> Provider;

    /// Vendor-imposed ceiling on retrievable results, independent of the
    /// reported total-hit count
    fn max_accessible_results(&self) -> u64;

    /// Open a vendor session. Default: sessionless.
    async fn start_session(&self, _as_guest: bool) -> Result<Session, EngineError> {
        Ok(Session::none())
    }

    /// Release a vendor session. Default: nothing to release.
    async fn stop_session(&self, _session: Session) -> Result<(), EngineError> {
        Ok(())
    }

    /// Translate a generic search-field name into the vendor's field code
    fn search_field(&self, generic: &str) -> &'static str;

    /// Render a caller-supplied date bound in the vendor's syntax
    fn date_format(&self, value: &str, anchor: DateAnchor) -> String;

    /// Run a search and normalize the vendor response.
    ///
    /// Vendor-side failures (protocol, parse) degrade to a well-formed
    /// empty [`Response`] with a non-zero error code; only
    /// connectivity-class failures surface as `Err`.
    async fn search(&self, params: &SearchParams) -> Result<Response, EngineError>;

    /// Fetch one record by composite or native id. The returned response
    /// carries zero or one document (see [`Response::first`]).
    async fn lookup_by_id(&self, id: &str, params: &SearchParams) -> Result<Response, EngineError>;
}

/// Errors raised inside an engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Socket/timeout/DNS failure — always re-raised to the caller
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status or vendor-reported error payload
    #[error("Vendor error {code}: {message}")]
    Protocol { code: i32, message: String },

    /// Empty or malformed XML/JSON body
    #[error("Parse error: {0}")]
    Parse(String),

    /// Session misuse (e.g. a call issued without a token) — internal,
    /// fatal, propagates
    #[error("Session error: {0}")]
    Session(String),

    /// Caller-side parameter mistake
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or unusable provider configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Numeric code to carry into a degraded [`Response`]
    pub fn vendor_code(&self) -> i32 {
        match self {
            EngineError::Protocol { code, .. } if *code != 0 => *code,
            _ => ERROR_UNAVAILABLE,
        }
    }

    /// Whether this is a connectivity-class failure that must propagate
    pub fn is_connectivity(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        // Statuses are checked explicitly before reading bodies, so any
        // reqwest error reaching here is transport-level.
        EngineError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for EngineError {
    fn from(err: quick_xml::DeError) -> Self {
        EngineError::Parse(format!("XML: {}", err))
    }
}

/// Shared degrade-or-propagate policy applied at every adapter boundary.
///
/// Protocol and parse failures become an explicitly-empty reset response;
/// everything else (network, session, bad request, bad config) is the
/// caller's problem and propagates.
pub(crate) fn degrade(
    provider: Provider,
    per_page: u32,
    err: EngineError,
) -> Result<Response, EngineError> {
    match &err {
        EngineError::Protocol { .. } | EngineError::Parse(_) => {
            tracing::warn!(provider = provider.id(), error = %err, "degrading vendor failure to empty response");
            Ok(Response::reset(provider, err.vendor_code(), per_page))
        }
        _ => Err(err),
    }
}
