//! Mock engine for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::engines::{DateAnchor, Engine, EngineError, Session};
use crate::models::{Document, Provider, Response, SearchParams};

/// A mock engine that returns predefined responses and counts session
/// lifecycle calls.
#[derive(Debug, Default)]
pub struct MockEngine {
    search_response: Mutex<Option<Response>>,
    fail_search: AtomicBool,
    sessions_started: AtomicUsize,
    sessions_stopped: AtomicUsize,
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search response to return.
    pub fn set_search_response(&self, response: Response) {
        let mut guard = self.search_response.lock().unwrap();
        *guard = Some(response);
    }

    /// Make every search fail with a network error.
    pub fn fail_searches(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// Number of sessions opened so far.
    pub fn sessions_started(&self) -> usize {
        self.sessions_started.load(Ordering::SeqCst)
    }

    /// Number of sessions released so far.
    pub fn sessions_stopped(&self) -> usize {
        self.sessions_stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn provider(&self) -> Provider {
        Provider::Ebsco
    }

    fn max_accessible_results(&self) -> u64 {
        2000
    }

    async fn start_session(&self, _as_guest: bool) -> Result<Session, EngineError> {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        Ok(Session::with_token("mock-token"))
    }

    async fn stop_session(&self, _session: Session) -> Result<(), EngineError> {
        self.sessions_stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn search_field(&self, _generic: &str) -> &'static str {
        "TX"
    }

    fn date_format(&self, value: &str, _anchor: DateAnchor) -> String {
        value.to_string()
    }

    async fn search(&self, params: &SearchParams) -> Result<Response, EngineError> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(EngineError::Network("mock failure".into()));
        }
        let guard = self.search_response.lock().unwrap();
        match &*guard {
            Some(response) => Ok(response.clone()),
            None => Ok(Response::empty(self.provider(), params.per_page)),
        }
    }

    async fn lookup_by_id(&self, id: &str, _params: &SearchParams) -> Result<Response, EngineError> {
        let guard = self.search_response.lock().unwrap();
        let doc: Option<Document> = guard
            .as_ref()
            .and_then(|r| r.docs.iter().find(|d| d.doc_id == id).cloned());
        match doc {
            Some(doc) => {
                let mut response = Response::empty(self.provider(), 1);
                response.total = 1;
                response.docs = vec![doc];
                Ok(response)
            }
            None => Ok(Response::empty(self.provider(), 1)),
        }
    }
}

/// Helper function to create a mock document for testing.
pub fn make_document(doc_id: &str, title: &str, provider: Provider) -> Document {
    Document::new(doc_id.to_string(), title.to_string(), provider)
}
