//! ProQuest Summon adapter.
//!
//! Signed REST calls (access id + secret key) returning JSON. Summon has
//! no session handshake, a hard 1000-result ceiling, and a fixed 50-result
//! page size; single-document fetches by absolute position are emulated by
//! fetching the page the position falls on and extracting one document.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::SummonConfig;
use crate::engines::{degrade, DateAnchor, Engine, EngineError, Session};
use crate::models::{
    compute_paging, Document, DocumentBuilder, Facet, FacetItem, FullText, Link, Provider,
    Response, SearchParams,
};
use crate::utils::HttpClient;

/// Hard vendor ceiling on retrievable results
const MAX_ACCESSIBLE_RESULTS: u64 = 1000;

/// Fixed page size: Summon serves at most 50 documents per request
const MAX_PER_PAGE: u32 = 50;

/// Publication-year value when the vendor omits the date. Downstream
/// display logic keys on this exact sentinel; it differs from EBSCO's
/// `"0"` and Primo's `""` on purpose.
const MISSING_DATE: &str = "1000";

/// Accept header, also part of every request signature
const ACCEPT: &str = "application/json";

/// Backslash-escape `,` and `:` in a term; commas delimit the
/// field/value/negation triple in `s.fvf` filters and colons delimit
/// fielded queries.
pub(crate) fn scrub(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for ch in value.chars() {
        if !escaped && matches!(ch, ',' | ':') {
            out.push('\\');
        }
        out.push(ch);
        escaped = !escaped && ch == '\\';
    }
    out
}

/// Inverse of [`scrub`]
#[allow(dead_code)]
pub(crate) fn unscrub(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && matches!(chars.peek(), Some(',' | ':')) {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Resolve an absolute 1-based result position to the fixed-size page it
/// falls on and its 0-based offset within that page. There is no native
/// fetch-the-Nth-result call; a position past the page boundary re-enters
/// the divmod before indexing.
pub(crate) fn position_to_page_offset(index: u64) -> (u64, usize) {
    let per = u64::from(MAX_PER_PAGE);
    let index = index.max(1);
    let page = index.div_ceil(per);
    let mut offset = index - (page - 1) * per;
    if offset > per {
        offset = (offset - 1) % per + 1;
    }
    (page, (offset - 1) as usize)
}

/// Summon engine
#[derive(Debug, Clone)]
pub struct SummonEngine {
    config: SummonConfig,
    client: HttpClient,
}

impl SummonEngine {
    /// Create a new Summon engine
    pub fn new(config: SummonConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the search query as (name, value) pairs
    fn build_search_query(&self, params: &SearchParams, page: u64, per_page: u32) -> Vec<(String, String)> {
        let mut query = Vec::new();

        let term = scrub(&params.query);
        let q = match params.field.as_deref().map(|f| self.search_field(f)) {
            Some(field) if !field.is_empty() && !params.query.trim().is_empty() => {
                format!("{}:({})", field, term)
            }
            _ => term,
        };
        query.push(("s.q".to_string(), q));

        // Facet filters: one field,value,false triple per selected value
        let mut facet_names: Vec<&String> = params.facets.keys().collect();
        facet_names.sort();
        for name in facet_names {
            for value in &params.facets[name] {
                query.push((
                    "s.fvf".to_string(),
                    format!("{},{},false", name, scrub(value)),
                ));
            }
        }

        // Facets offered back to the caller for narrowing
        for field in ["ContentType", "SubjectTerms", "Language"] {
            query.push(("s.ff".to_string(), format!("{},or,1,20", field)));
        }

        if let Some(range) = &params.date_range {
            if !range.is_empty() {
                let from = self.date_format(range.from.as_deref().unwrap_or("0"), DateAnchor::Start);
                let to = match &range.to {
                    Some(to) => self.date_format(to, DateAnchor::End),
                    None => "*".to_string(),
                };
                query.push((
                    "s.rf".to_string(),
                    format!("PublicationDate,{}:{}", from, to),
                ));
            }
        }

        if params.sort.as_deref() == Some("date") {
            query.push(("s.sort".to_string(), "PublicationDate:desc".to_string()));
        }

        query.push(("s.ps".to_string(), per_page.to_string()));
        query.push(("s.pn".to_string(), page.to_string()));

        query
    }

    /// Canonical string for request signing: accept, date, host, path and
    /// the alphabetized query, newline-joined.
    fn canonical_string(&self, date: &str, query: &[(String, String)]) -> String {
        let (host, path) = match Url::parse(&self.config.base_url) {
            Ok(url) => (
                url.host_str().unwrap_or_default().to_string(),
                format!("{}/search", url.path().trim_end_matches('/')),
            ),
            Err(_) => (String::new(), "/search".to_string()),
        };

        let mut pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();

        format!("{}\n{}\n{}\n{}\n{}\n", ACCEPT, date, host, path, pairs.join("&"))
    }

    /// Digest of the canonical string keyed with the secret
    fn sign(&self, canonical: &str) -> String {
        let digest = Sha256::digest(format!("{}{}", canonical, self.config.secret_key).as_bytes());
        BASE64.encode(digest)
    }

    async fn fetch(&self, query: &[(String, String)]) -> Result<JsonResponse, EngineError> {
        let date = chrono::Utc::now().to_rfc2822();
        let digest = self.sign(&self.canonical_string(&date, query));

        let response = self
            .client
            .get(&self.endpoint())
            .header("Accept", ACCEPT)
            .header("x-summon-date", &date)
            .header(
                "Authorization",
                format!("Summon {};{}", self.config.access_id, digest),
            )
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn normalize(&self, parsed: JsonResponse, docs: Vec<Document>, per_page: u32, start: u64) -> Response {
        let paging = compute_paging(parsed.record_count, per_page, start, MAX_ACCESSIBLE_RESULTS);
        let facets = parsed
            .facet_fields
            .into_iter()
            .map(|field| {
                let items = field
                    .counts
                    .into_iter()
                    .map(|c| FacetItem::new(c.value.unwrap_or_default(), c.count))
                    .collect();
                Facet::new(field.display_name.unwrap_or_default(), items)
            })
            .collect();
        Response::new(Provider::Summon, docs, facets, parsed.record_count, paging)
    }

    /// Fetch the fixed-size page an absolute position falls on and keep
    /// exactly the one document at its in-page offset.
    async fn fetch_position(&self, params: &SearchParams, index: u64) -> Result<Response, EngineError> {
        let (page, offset) = position_to_page_offset(index);
        let query = self.build_search_query(params, page, MAX_PER_PAGE);
        let mut parsed = self.fetch(&query).await?;

        let docs: Vec<Document> = std::mem::take(&mut parsed.documents)
            .into_iter()
            .skip(offset)
            .take(1)
            .map(normalize_doc)
            .collect();

        let start = (page - 1) * u64::from(MAX_PER_PAGE);
        Ok(self.normalize(parsed, docs, MAX_PER_PAGE, start))
    }
}

#[async_trait]
impl Engine for SummonEngine {
    fn provider(&self) -> Provider {
        Provider::Summon
    }

    fn max_accessible_results(&self) -> u64 {
        MAX_ACCESSIBLE_RESULTS
    }

    async fn start_session(&self, _as_guest: bool) -> Result<Session, EngineError> {
        Ok(Session::none())
    }

    fn search_field(&self, generic: &str) -> &'static str {
        match generic {
            "title" => "Title",
            "author" | "creator" => "Author",
            "subject" => "SubjectTerms",
            "source" | "journal" => "PublicationTitle",
            "issn" => "ISSN",
            "isbn" => "ISBN",
            _ => "",
        }
    }

    /// Summon ranges take bare years: `PublicationDate,YYYY:YYYY`
    fn date_format(&self, value: &str, _anchor: DateAnchor) -> String {
        value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect()
    }

    async fn search(&self, params: &SearchParams) -> Result<Response, EngineError> {
        let outcome = match params.index {
            Some(index) => self.fetch_position(params, index).await,
            None => {
                let per_page = params.per_page.clamp(1, MAX_PER_PAGE);
                // Never ask for a page past the ceiling; land on the last
                // retrievable one instead.
                let max_page = MAX_ACCESSIBLE_RESULTS / u64::from(per_page);
                let page = u64::from(params.page.max(1)).min(max_page.max(1));

                let query = self.build_search_query(params, page, per_page);
                let fetched = self.fetch(&query).await;
                fetched.map(|mut parsed| {
                    let docs = std::mem::take(&mut parsed.documents)
                        .into_iter()
                        .map(normalize_doc)
                        .collect();
                    let start = (page - 1) * u64::from(per_page);
                    self.normalize(parsed, docs, per_page, start)
                })
            }
        };

        outcome.or_else(|err| degrade(Provider::Summon, params.per_page.clamp(1, MAX_PER_PAGE), err))
    }

    async fn lookup_by_id(&self, id: &str, params: &SearchParams) -> Result<Response, EngineError> {
        let id = id.trim();
        if id.is_empty() {
            // No native id: fall back to the position-based flow
            return match params.index {
                Some(index) => self
                    .fetch_position(params, index)
                    .await
                    .or_else(|err| degrade(Provider::Summon, 1, err)),
                None => Err(EngineError::InvalidRequest(
                    "Summon lookup needs a document id or an absolute index".into(),
                )),
            };
        }

        let query = vec![
            ("s.fids".to_string(), id.to_string()),
            ("s.ps".to_string(), "1".to_string()),
        ];

        let outcome = self.fetch(&query).await.map(|mut parsed| {
            let docs: Vec<Document> = std::mem::take(&mut parsed.documents)
                .into_iter()
                .map(normalize_doc)
                .take(1)
                .collect();
            parsed.record_count = docs.len() as u64;
            self.normalize(parsed, docs, 1, 0)
        });

        outcome.or_else(|err| degrade(Provider::Summon, 1, err))
    }
}

/// Classify a non-success vendor response; Summon error payloads carry a
/// JSON `errors` list.
fn classify_error(status: u16, body: &str) -> EngineError {
    let message = serde_json::from_str::<JsonErrorResponse>(body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("Summon returned HTTP {}", status));

    EngineError::Protocol {
        code: i32::from(status),
        message,
    }
}

/// Flatten one Summon document into the canonical model
fn normalize_doc(doc: JsonDoc) -> Document {
    let first = |values: &[String]| values.first().cloned().unwrap_or_default();

    let identifier = doc
        .doi
        .first()
        .map(|d| format!("DOI: {}", d))
        .or_else(|| doc.issn.first().map(|i| format!("ISSN: {}", i)))
        .unwrap_or_default();

    let creation_date = doc
        .publication_year
        .first()
        .filter(|y| !y.is_empty())
        .cloned()
        .unwrap_or_else(|| MISSING_DATE.to_string());

    let mut builder = DocumentBuilder::new(first(&doc.id), first(&doc.title), Provider::Summon)
        .creator(doc.author.join("; "))
        .subjects(doc.subject_terms.join("; "))
        .languages(doc.language.join("; "))
        .source(first(&doc.publication_title))
        .identifier(identifier)
        .abstract_text(first(&doc.r#abstract))
        .creation_date(creation_date);

    if let Some(content_type) = doc.content_type.first().filter(|t| !t.is_empty()) {
        builder = builder.doc_type(content_type.clone());
    }
    if let Some(journal) = doc.publication_title.first().filter(|j| !j.is_empty()) {
        builder = builder.journal(journal.clone());
    }
    if let Some(volume) = doc.volume.first().filter(|v| !v.is_empty()) {
        builder = builder.volume(volume.clone());
    }
    if let Some(issue) = doc.issue.first().filter(|i| !i.is_empty()) {
        builder = builder.issue(issue.clone());
    }
    if let Some(start) = doc.start_page.first().filter(|p| !p.is_empty()) {
        let pages = match doc.end_page.first().filter(|p| !p.is_empty()) {
            Some(end) => format!("{}-{}", start, end),
            None => start.clone(),
        };
        builder = builder.page_range(pages);
    }

    for term in &doc.subject_terms {
        if !term.is_empty() {
            builder = builder.subject_facet(term.clone());
        }
    }

    if let Some(link) = doc.link.filter(|l| !l.is_empty()) {
        let mut record_link = Link::new(link, "View record");
        if let Some(thumbnail) = doc.thumbnail_m.filter(|t| !t.is_empty()) {
            record_link = record_link.thumbnail(thumbnail);
        }
        builder = builder.link(record_link);
    }

    if doc.has_full_text {
        builder = builder.fulltext(FullText {
            body: None,
            format: doc.content_type.first().cloned(),
            url: doc.url.filter(|u| !u.is_empty()),
        });
    }

    builder.build()
}

// ===== Summon API Types =====

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(default)]
    documents: Vec<JsonDoc>,
    #[serde(rename = "recordCount", default)]
    record_count: u64,
    #[serde(rename = "facetFields", default)]
    facet_fields: Vec<JsonFacetField>,
}

#[derive(Debug, Deserialize)]
struct JsonDoc {
    #[serde(rename = "ID", default)]
    id: Vec<String>,
    #[serde(rename = "Title", default)]
    title: Vec<String>,
    #[serde(rename = "Author", default)]
    author: Vec<String>,
    #[serde(rename = "Abstract", default)]
    r#abstract: Vec<String>,
    #[serde(rename = "SubjectTerms", default)]
    subject_terms: Vec<String>,
    #[serde(rename = "Language", default)]
    language: Vec<String>,
    #[serde(rename = "PublicationTitle", default)]
    publication_title: Vec<String>,
    #[serde(rename = "PublicationYear", default)]
    publication_year: Vec<String>,
    #[serde(rename = "Volume", default)]
    volume: Vec<String>,
    #[serde(rename = "Issue", default)]
    issue: Vec<String>,
    #[serde(rename = "StartPage", default)]
    start_page: Vec<String>,
    #[serde(rename = "EndPage", default)]
    end_page: Vec<String>,
    #[serde(rename = "ISSN", default)]
    issn: Vec<String>,
    #[serde(rename = "DOI", default)]
    doi: Vec<String>,
    #[serde(rename = "ContentType", default)]
    content_type: Vec<String>,
    #[serde(rename = "link")]
    link: Option<String>,
    #[serde(rename = "url")]
    url: Option<String>,
    #[serde(rename = "thumbnail_m")]
    thumbnail_m: Option<String>,
    #[serde(rename = "hasFullText", default)]
    has_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct JsonFacetField {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    counts: Vec<JsonFacetCount>,
}

#[derive(Debug, Deserialize)]
struct JsonFacetCount {
    value: Option<String>,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct JsonErrorResponse {
    #[serde(default)]
    errors: Vec<JsonError>,
}

#[derive(Debug, Deserialize)]
struct JsonError {
    message: Option<String>,
}
