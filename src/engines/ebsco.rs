//! EBSCO EDS adapter.
//!
//! REST+XML protocol over `/edsapi/rest/{createsession|search|retrieve|endsession}`.
//! Every call after session creation carries the session token in an
//! `x-sessionToken` header. Sessions are scoped to one logical operation:
//! opened at the start, closed on every exit path, never stored.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::config::EbscoConfig;
use crate::engines::{degrade, DateAnchor, Engine, EngineError, Session};
use crate::models::{
    compute_paging, Document, DocumentBuilder, Facet, FacetItem, FullText, Link, Paging, Provider,
    Response, SearchParams,
};
use crate::utils::{sanitize_fulltext, strip_tags, HttpClient};

/// Vendor error code for an expired or invalidated session token.
/// Recoverable: drop the dead session, open a fresh one, re-issue once.
const SESSION_INVALID: i32 = 109;

/// Creation-date value when the vendor omits the publication date.
/// Downstream display logic keys on this exact sentinel; it differs from
/// Primo's `""` and Summon's `"1000"` on purpose.
const MISSING_DATE: &str = "0";

/// A provider-scoped compound key: EDS records are addressed by database
/// id plus accession number, joined with `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbscoId {
    pub dbid: String,
    pub accession: String,
}

impl EbscoId {
    /// Create an id from its parts
    pub fn new(dbid: impl Into<String>, accession: impl Into<String>) -> Self {
        Self {
            dbid: dbid.into(),
            accession: accession.into(),
        }
    }

    /// Parse `"dbid:accession"`, accepting the percent-encoded variant too
    pub fn parse(id: &str) -> Result<Self, EngineError> {
        let decoded = if id.contains('%') {
            urlencoding::decode(id)
                .map_err(|e| EngineError::InvalidRequest(format!("Undecodable id '{}': {}", id, e)))?
                .into_owned()
        } else {
            id.to_string()
        };

        let (dbid, accession) = decoded
            .split_once(':')
            .ok_or_else(|| EngineError::InvalidRequest(format!("Malformed EDS id '{}'", id)))?;

        if dbid.is_empty() || accession.is_empty() {
            return Err(EngineError::InvalidRequest(format!(
                "Malformed EDS id '{}'",
                id
            )));
        }

        Ok(Self::new(dbid, accession))
    }

    /// URL-safe encoded form. Percent-encodes the string form with `.`
    /// escaped as well, since accession numbers routinely contain dots and
    /// the id travels inside path segments.
    pub fn encode(&self) -> String {
        urlencoding::encode(&self.to_string())
            .into_owned()
            .replace('.', "%2E")
    }
}

impl std::fmt::Display for EbscoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dbid, self.accession)
    }
}

/// Backslash-escape `:`, `,`, `(`, `)` in a term without double-escaping
/// characters that already carry a backslash.
pub(crate) fn scrub(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for ch in value.chars() {
        if !escaped && matches!(ch, ':' | ',' | '(' | ')') {
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
        if ch == '\\' && matches!(chars.peek(), Some(':' | ',' | '(' | ')')) {
            continue;
        }
        out.push(ch);
    }
    out
}

/// The vendor silently de-duplicates results across pages, so the reported
/// total can shrink below a page the caller already asked for. When the
/// requested window falls past the total, land on `total / per_page + 1` —
/// the last page the vendor still serves for the shrunken total (observed
/// behavior, not a documented contract).
fn clamp_to_last_page(requested_page: u32, per_page: u32, total: u64) -> u32 {
    let per = u64::from(per_page.max(1));
    if u64::from(requested_page) * per > total && total > 0 {
        (total / per + 1) as u32
    } else {
        requested_page.max(1)
    }
}

/// EBSCO EDS engine
#[derive(Debug, Clone)]
pub struct EbscoEngine {
    config: EbscoConfig,
    client: HttpClient,
}

impl EbscoEngine {
    /// Create a new EDS engine
    pub fn new(config: EbscoConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), op)
    }

    /// The token a post-session call must carry. Calling without one is an
    /// internal error, distinct from the vendor rejecting a stale token.
    fn require_token<'s>(&self, session: &'s Session) -> Result<&'s str, EngineError> {
        session
            .token()
            .ok_or_else(|| EngineError::Session("EDS call issued without a session token".into()))
    }

    /// Build the search query string as (name, value) pairs
    fn build_search_query(&self, params: &SearchParams) -> Vec<(String, String)> {
        let mut query = Vec::new();

        let field = self.search_field(params.field.as_deref().unwrap_or(""));
        query.push((
            "query-1".to_string(),
            format!("AND,{}:{}", field, scrub(&params.query)),
        ));

        // Facet filters, except the tlevel pseudo-facet which is really the
        // peer-reviewed limiter
        let mut facet_names: Vec<&String> = params.facets.keys().collect();
        facet_names.sort();
        let mut filter_id = 1;
        for name in facet_names {
            if name == "tlevel" {
                query.push(("limiter".to_string(), "RV:Y".to_string()));
                continue;
            }
            for value in &params.facets[name] {
                query.push((
                    "facetfilter".to_string(),
                    format!("{},{}:{}", filter_id, name, scrub(value)),
                ));
                filter_id += 1;
            }
        }

        if let Some(range) = &params.date_range {
            if !range.is_empty() {
                let from = self.date_format(range.from.as_deref().unwrap_or("1000"), DateAnchor::Start);
                let to = match &range.to {
                    Some(to) => self.date_format(to, DateAnchor::End),
                    None => self.date_format(range.from.as_deref().unwrap_or("1000"), DateAnchor::End),
                };
                query.push(("limiter".to_string(), format!("DT1:{}/{}", from, to)));
            }
        }

        let sort = match params.sort.as_deref() {
            Some("date") => "date",
            _ => "relevance",
        };
        query.push(("sort".to_string(), sort.to_string()));

        let (page, per_page) = page_for(params);
        query.push(("resultsperpage".to_string(), per_page.to_string()));
        query.push(("pagenumber".to_string(), page.to_string()));
        query.push(("includefacets".to_string(), "y".to_string()));
        query.push(("view".to_string(), "detailed".to_string()));

        query
    }

    async fn close_session_quietly(&self, session: Session) {
        if let Err(e) = self.stop_session(session).await {
            tracing::warn!(error = %e, "failed to end EDS session");
        }
    }

    /// One full search attempt: open a session, run, close the session on
    /// every exit path.
    async fn run_search_once(&self, params: &SearchParams) -> Result<Response, EngineError> {
        let session = self.start_session(self.config.guest).await?;
        let outcome = self.search_in_session(&session, params).await;
        self.close_session_quietly(session).await;
        outcome
    }

    async fn search_in_session(
        &self,
        session: &Session,
        params: &SearchParams,
    ) -> Result<Response, EngineError> {
        let token = self.require_token(session)?;
        let query = self.build_search_query(params);

        let response = self
            .client
            .get(&self.endpoint("search"))
            .header("x-sessionToken", token)
            .header("Accept", "application/xml")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let (total, docs, facets) = parse_search_response(&body)?;

        let (requested_page, per_page) = page_for(params);
        let page = clamp_to_last_page(requested_page, per_page, total);
        let start = u64::from(page - 1) * u64::from(per_page);
        let paging = compute_paging(total, per_page, start, self.max_accessible_results());

        let docs = match params.index {
            Some(index) => pick_at_index(docs, index, per_page),
            None => docs,
        };

        Ok(Response::new(Provider::Ebsco, docs, facets, total, paging))
    }

    async fn run_retrieve_once(&self, id: &EbscoId) -> Result<Response, EngineError> {
        let session = self.start_session(self.config.guest).await?;
        let outcome = self.retrieve_in_session(&session, id).await;
        self.close_session_quietly(session).await;
        outcome
    }

    async fn retrieve_in_session(
        &self,
        session: &Session,
        id: &EbscoId,
    ) -> Result<Response, EngineError> {
        let token = self.require_token(session)?;

        let response = self
            .client
            .get(&self.endpoint("retrieve"))
            .header("x-sessionToken", token)
            .header("Accept", "application/xml")
            .query(&[("dbid", id.dbid.as_str()), ("an", id.accession.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let doc = parse_retrieve_response(&body)?;
        Ok(Response::new(
            Provider::Ebsco,
            vec![doc],
            Vec::new(),
            1,
            Paging {
                current_page: 1,
                per_page: 1,
                total_pages: 1,
            },
        ))
    }
}

fn is_session_invalid(err: &EngineError) -> bool {
    matches!(err, EngineError::Protocol { code, .. } if *code == SESSION_INVALID)
}

/// Page/per-page a request resolves to, honoring the absolute-index cursor
fn page_for(params: &SearchParams) -> (u32, u32) {
    match params.index {
        Some(index) => {
            let per = u64::from(params.per_page.max(1));
            let page = index.max(1).div_ceil(per);
            (page as u32, params.per_page.max(1))
        }
        None => (params.page.max(1), params.per_page.max(1)),
    }
}

/// Keep only the document sitting at the absolute position on this page
fn pick_at_index(docs: Vec<Document>, index: u64, per_page: u32) -> Vec<Document> {
    let per = u64::from(per_page.max(1));
    let offset = ((index.max(1) - 1) % per) as usize;
    docs.into_iter().skip(offset).take(1).collect()
}

#[async_trait]
impl Engine for EbscoEngine {
    fn provider(&self) -> Provider {
        Provider::Ebsco
    }

    // EDS pages through the full reported total; shrinkage from vendor-side
    // de-duplication is handled by the page clamp instead of a fixed ceiling.
    fn max_accessible_results(&self) -> u64 {
        u64::MAX
    }

    async fn start_session(&self, as_guest: bool) -> Result<Session, EngineError> {
        let guest = if as_guest { "y" } else { "n" };

        let response = self
            .client
            .post(&self.endpoint("createsession"))
            .header("Accept", "application/xml")
            .query(&[("profile", self.config.profile.as_str()), ("guest", guest)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let token = parse_session_token(&body)?;
        tracing::debug!(guest = as_guest, "opened EDS session");
        Ok(Session::with_token(token))
    }

    async fn stop_session(&self, session: Session) -> Result<(), EngineError> {
        let token = match session.token() {
            Some(token) => token.to_string(),
            // Nothing was issued, nothing to release
            None => return Ok(()),
        };

        let response = self
            .client
            .get(&self.endpoint("endsession"))
            .header("x-sessionToken", token.as_str())
            .query(&[("sessiontoken", token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::Protocol {
                code: i32::from(response.status().as_u16()),
                message: "endsession rejected".into(),
            });
        }
        tracing::debug!("closed EDS session");
        Ok(())
    }

    fn search_field(&self, generic: &str) -> &'static str {
        match generic {
            "title" => "TI",
            "author" | "creator" => "AU",
            "subject" => "SU",
            "source" | "journal" => "SO",
            "abstract" => "AB",
            "issn" => "IS",
            "isbn" => "IB",
            _ => "TX",
        }
    }

    /// Dates render as `YYYY-MM`; a bare year gets the anchor's month
    fn date_format(&self, value: &str, anchor: DateAnchor) -> String {
        let v = value.trim();
        let year: String = v.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = &v[year.len()..];

        if let Some(month) = rest.strip_prefix('-') {
            let month: String = month.chars().take_while(|c| c.is_ascii_digit()).take(2).collect();
            if !month.is_empty() {
                return format!("{}-{:0>2}", year, month);
            }
        }

        match anchor {
            DateAnchor::Start => format!("{}-01", year),
            DateAnchor::End => format!("{}-12", year),
        }
    }

    async fn search(&self, params: &SearchParams) -> Result<Response, EngineError> {
        let outcome = match self.run_search_once(params).await {
            Err(err) if is_session_invalid(&err) => {
                tracing::debug!("EDS rejected the session token, reopening");
                self.run_search_once(params).await
            }
            other => other,
        };

        outcome.or_else(|err| degrade(Provider::Ebsco, params.per_page, err))
    }

    async fn lookup_by_id(&self, id: &str, _params: &SearchParams) -> Result<Response, EngineError> {
        let id = EbscoId::parse(id)?;

        let outcome = match self.run_retrieve_once(&id).await {
            Err(err) if is_session_invalid(&err) => {
                tracing::debug!("EDS rejected the session token, reopening");
                self.run_retrieve_once(&id).await
            }
            other => other,
        };

        outcome.or_else(|err| degrade(Provider::Ebsco, 1, err))
    }
}

/// Classify a non-success vendor response. EDS wraps errors in an XML
/// envelope carrying a numeric code; when the body is not that envelope
/// the HTTP status stands in.
fn classify_error(status: u16, body: &str) -> EngineError {
    if let Ok(err) = from_str::<XmlErrorMessage>(body) {
        if let Some(code) = err.error_number {
            return EngineError::Protocol {
                code,
                message: err
                    .detailed_error_description
                    .or(err.error_description)
                    .unwrap_or_default(),
            };
        }
    }
    EngineError::Protocol {
        code: i32::from(status),
        message: format!("EDS returned HTTP {}", status),
    }
}

fn parse_session_token(xml: &str) -> Result<String, EngineError> {
    let parsed: XmlCreateSessionResponse = from_str(xml)?;
    match parsed.session_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(EngineError::Parse("createsession returned no token".into())),
    }
}

fn parse_search_response(xml: &str) -> Result<(u64, Vec<Document>, Vec<Facet>), EngineError> {
    let parsed: XmlSearchResponse = from_str(xml)?;
    let result = parsed
        .search_result
        .ok_or_else(|| EngineError::Parse("search response without SearchResult".into()))?;

    let total = result
        .statistics
        .as_ref()
        .and_then(|s| s.total_hits)
        .unwrap_or(0);

    let docs = result
        .data
        .and_then(|d| d.records)
        .map(|r| r.records)
        .unwrap_or_default()
        .into_iter()
        .filter_map(normalize_record)
        .collect();

    let facets = result
        .available_facets
        .map(|af| af.facets)
        .unwrap_or_default()
        .into_iter()
        .map(|facet| {
            let items = facet
                .values
                .map(|v| v.values)
                .unwrap_or_default()
                .into_iter()
                .map(|v| FacetItem::new(v.value.unwrap_or_default(), v.count.unwrap_or(0)))
                .collect();
            Facet::new(facet.id.unwrap_or_default(), items)
        })
        .collect();

    Ok((total, docs, facets))
}

fn parse_retrieve_response(xml: &str) -> Result<Document, EngineError> {
    let parsed: XmlRetrieveResponse = from_str(xml)?;
    parsed
        .record
        .and_then(normalize_record)
        .ok_or_else(|| EngineError::Parse("retrieve response without a record".into()))
}

/// Flatten one EDS record into the canonical model. Records missing a
/// header (and therefore an id) are dropped.
fn normalize_record(record: XmlRecord) -> Option<Document> {
    let header = record.header?;
    let id = EbscoId::new(header.db_id.unwrap_or_default(), header.an.unwrap_or_default());
    if id.dbid.is_empty() || id.accession.is_empty() {
        return None;
    }

    let bib = record
        .record_info
        .as_ref()
        .and_then(|ri| ri.bib_record.as_ref());
    let entity = bib.and_then(|b| b.bib_entity.as_ref());
    let part_of = bib
        .and_then(|b| b.bib_relationships.as_ref())
        .and_then(|r| r.is_part_of_relationships.as_ref())
        .and_then(|r| r.is_part_of.first())
        .and_then(|p| p.bib_entity.as_ref());

    let mut title = entity
        .and_then(|e| e.titles.as_ref())
        .and_then(|t| t.titles.first())
        .and_then(|t| t.title_full.clone())
        .unwrap_or_default();

    let subjects: Vec<String> = entity
        .and_then(|e| e.subjects.as_ref())
        .map(|s| {
            s.subjects
                .iter()
                .filter_map(|subj| subj.subject_full.clone())
                .collect()
        })
        .unwrap_or_default();

    let languages: Vec<String> = entity
        .and_then(|e| e.languages.as_ref())
        .map(|l| l.languages.iter().filter_map(|lang| lang.text.clone()).collect())
        .unwrap_or_default();

    let mut identifier = entity
        .and_then(|e| e.identifiers.as_ref())
        .and_then(|ids| identifier_display(&ids.identifiers));

    let page_range = entity
        .and_then(|e| e.physical_description.as_ref())
        .and_then(|p| p.pagination.as_ref())
        .and_then(page_range_display);

    let journal = part_of
        .and_then(|p| p.titles.as_ref())
        .and_then(|t| t.titles.first())
        .and_then(|t| t.title_full.clone());

    let (volume, issue) = part_of
        .and_then(|p| p.numbering.as_ref())
        .map(|n| {
            let mut volume = None;
            let mut issue = None;
            for number in &n.numbers {
                match number.number_type.as_deref() {
                    Some("volume") => volume = number.value.clone(),
                    Some("issue") => issue = number.value.clone(),
                    _ => {}
                }
            }
            (volume, issue)
        })
        .unwrap_or((None, None));

    let creation_date = part_of
        .and_then(|p| p.dates.as_ref())
        .and_then(|d| {
            d.dates
                .iter()
                .find(|date| date.date_type.as_deref() == Some("published"))
                .or_else(|| d.dates.first())
        })
        .and_then(date_display)
        .unwrap_or_else(|| MISSING_DATE.to_string());

    // Display elements: a flat list of heterogeneous (Name, Data) pairs
    // dispatched per key. Bibliographic values above win; the display list
    // fills the gaps.
    let mut creator_parts: Vec<String> = Vec::new();
    let mut source = String::new();
    let mut abstract_text = String::new();
    let mut doc_type = None;
    if let Some(items) = record.items.as_ref() {
        for item in &items.items {
            let data = match &item.data {
                Some(data) => strip_tags(data),
                None => continue,
            };
            if data.is_empty() {
                continue;
            }
            match item.name.as_deref() {
                Some("Title") if title.is_empty() => title = data,
                Some("TitleSource") => source = data,
                Some("TypeDocument") => doc_type = Some(data),
                Some("Author") => creator_parts.push(data),
                Some("Abstract") => abstract_text = data,
                Some("AbstractNonEng") if abstract_text.is_empty() => abstract_text = data,
                Some("DOI") if identifier.is_none() => identifier = Some(format!("DOI: {}", data)),
                Some("ISSN") if identifier.is_none() => identifier = Some(format!("ISSN: {}", data)),
                _ => {}
            }
        }
    }

    let mut builder = DocumentBuilder::new(id.to_string(), title, Provider::Ebsco)
        .creator(creator_parts.join("; "))
        .subjects(subjects.join("; "))
        .languages(languages.join("; "))
        .source(source)
        .identifier(identifier.unwrap_or_default())
        .abstract_text(abstract_text)
        .creation_date(creation_date);

    for subject in subjects {
        builder = builder.subject_facet(subject);
    }
    if let Some(doc_type) = doc_type {
        builder = builder.doc_type(doc_type);
    }
    if let Some(journal) = journal {
        builder = builder.journal(journal);
    }
    if let Some(volume) = volume {
        builder = builder.volume(volume);
    }
    if let Some(issue) = issue {
        builder = builder.issue(issue);
    }
    if let Some(pages) = page_range {
        builder = builder.page_range(pages);
    }

    if let Some(plink) = record.p_link.as_ref().filter(|l| !l.is_empty()) {
        let thumbnail = record
            .image_info
            .as_ref()
            .and_then(|i| i.cover_art.first())
            .and_then(|c| c.target.clone());
        let mut link = Link::new(plink.clone(), "View record");
        if let Some(thumbnail) = thumbnail {
            link = link.thumbnail(thumbnail);
        }
        builder = builder.link(link);
    }

    if let Some(fulltext) = record.full_text.as_ref() {
        let body = fulltext
            .text
            .as_ref()
            .filter(|t| t.availability.as_deref() == Some("1"))
            .and_then(|t| t.value.as_ref())
            .map(|v| sanitize_fulltext(v));
        let download = fulltext
            .links
            .as_ref()
            .and_then(|l| l.links.first());
        if body.is_some() || download.is_some() {
            builder = builder.fulltext(FullText {
                body,
                format: download.and_then(|d| d.link_type.clone()),
                url: download.and_then(|d| d.url.clone()),
            });
        }
    }

    Some(builder.build())
}

fn identifier_display(identifiers: &[XmlIdentifier]) -> Option<String> {
    for wanted in ["doi", "issn-print", "issn"] {
        if let Some(found) = identifiers.iter().find(|i| {
            i.identifier_type
                .as_deref()
                .map(|t| t.eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        }) {
            let value = found.value.clone()?;
            let label = if wanted == "doi" { "DOI" } else { "ISSN" };
            return Some(format!("{}: {}", label, value));
        }
    }
    None
}

fn page_range_display(pagination: &XmlPagination) -> Option<String> {
    let start: u64 = pagination.start_page.as_deref()?.trim().parse().ok()?;
    match pagination
        .page_count
        .as_deref()
        .and_then(|c| c.trim().parse::<u64>().ok())
    {
        Some(count) if count > 1 => Some(format!("{}-{}", start, start + count - 1)),
        _ => Some(start.to_string()),
    }
}

fn date_display(date: &XmlDate) -> Option<String> {
    let year = date.y.as_deref()?.trim();
    if year.is_empty() {
        return None;
    }
    match (date.m.as_deref(), date.d.as_deref()) {
        (Some(m), Some(d)) if !m.is_empty() && !d.is_empty() => {
            Some(format!("{}-{:0>2}-{:0>2}", year, m, d))
        }
        (Some(m), _) if !m.is_empty() => Some(format!("{}-{:0>2}", year, m)),
        _ => Some(year.to_string()),
    }
}

// ===== EDS API Types =====

#[derive(Debug, Deserialize)]
struct XmlErrorMessage {
    #[serde(rename = "ErrorNumber")]
    error_number: Option<i32>,
    #[serde(rename = "DetailedErrorDescription")]
    detailed_error_description: Option<String>,
    #[serde(rename = "ErrorDescription")]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlCreateSessionResponse {
    #[serde(rename = "SessionToken")]
    session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlSearchResponse {
    #[serde(rename = "SearchResult")]
    search_result: Option<XmlSearchResult>,
}

#[derive(Debug, Deserialize)]
struct XmlSearchResult {
    #[serde(rename = "Statistics")]
    statistics: Option<XmlStatistics>,
    #[serde(rename = "Data")]
    data: Option<XmlData>,
    #[serde(rename = "AvailableFacets")]
    available_facets: Option<XmlAvailableFacets>,
}

#[derive(Debug, Deserialize)]
struct XmlStatistics {
    #[serde(rename = "TotalHits")]
    total_hits: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct XmlData {
    #[serde(rename = "Records")]
    records: Option<XmlRecords>,
}

#[derive(Debug, Deserialize)]
struct XmlAvailableFacets {
    #[serde(rename = "AvailableFacet", default)]
    facets: Vec<XmlAvailableFacet>,
}

#[derive(Debug, Deserialize)]
struct XmlAvailableFacet {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "AvailableFacetValues")]
    values: Option<XmlAvailableFacetValues>,
}

#[derive(Debug, Deserialize)]
struct XmlAvailableFacetValues {
    #[serde(rename = "AvailableFacetValue", default)]
    values: Vec<XmlAvailableFacetValue>,
}

#[derive(Debug, Deserialize)]
struct XmlAvailableFacetValue {
    #[serde(rename = "Value")]
    value: Option<String>,
    #[serde(rename = "Count")]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct XmlRecords {
    #[serde(rename = "Record", default)]
    records: Vec<XmlRecord>,
}

#[derive(Debug, Deserialize)]
struct XmlRetrieveResponse {
    #[serde(rename = "Record")]
    record: Option<XmlRecord>,
}

#[derive(Debug, Deserialize)]
struct XmlRecord {
    #[serde(rename = "Header")]
    header: Option<XmlHeader>,
    #[serde(rename = "PLink")]
    p_link: Option<String>,
    #[serde(rename = "ImageInfo")]
    image_info: Option<XmlImageInfo>,
    #[serde(rename = "FullText")]
    full_text: Option<XmlFullText>,
    #[serde(rename = "Items")]
    items: Option<XmlItems>,
    #[serde(rename = "RecordInfo")]
    record_info: Option<XmlRecordInfo>,
}

#[derive(Debug, Deserialize)]
struct XmlHeader {
    #[serde(rename = "DbId")]
    db_id: Option<String>,
    #[serde(rename = "An")]
    an: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlImageInfo {
    #[serde(rename = "CoverArt", default)]
    cover_art: Vec<XmlCoverArt>,
}

#[derive(Debug, Deserialize)]
struct XmlCoverArt {
    #[serde(rename = "Target")]
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlFullText {
    #[serde(rename = "Text")]
    text: Option<XmlFullTextBody>,
    #[serde(rename = "Links")]
    links: Option<XmlFullTextLinks>,
}

#[derive(Debug, Deserialize)]
struct XmlFullTextBody {
    #[serde(rename = "Availability")]
    availability: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlFullTextLinks {
    #[serde(rename = "Link", default)]
    links: Vec<XmlFullTextLink>,
}

#[derive(Debug, Deserialize)]
struct XmlFullTextLink {
    #[serde(rename = "Type")]
    link_type: Option<String>,
    #[serde(rename = "Url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlItems {
    #[serde(rename = "Item", default)]
    items: Vec<XmlItem>,
}

#[derive(Debug, Deserialize)]
struct XmlItem {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Data")]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlRecordInfo {
    #[serde(rename = "BibRecord")]
    bib_record: Option<XmlBibRecord>,
}

#[derive(Debug, Deserialize)]
struct XmlBibRecord {
    #[serde(rename = "BibEntity")]
    bib_entity: Option<XmlBibEntity>,
    #[serde(rename = "BibRelationships")]
    bib_relationships: Option<XmlBibRelationships>,
}

#[derive(Debug, Deserialize)]
struct XmlBibEntity {
    #[serde(rename = "Titles")]
    titles: Option<XmlTitles>,
    #[serde(rename = "Identifiers")]
    identifiers: Option<XmlIdentifiers>,
    #[serde(rename = "Subjects")]
    subjects: Option<XmlSubjects>,
    #[serde(rename = "Languages")]
    languages: Option<XmlLanguages>,
    #[serde(rename = "PhysicalDescription")]
    physical_description: Option<XmlPhysicalDescription>,
    #[serde(rename = "Dates")]
    dates: Option<XmlDates>,
    #[serde(rename = "Numbering")]
    numbering: Option<XmlNumbering>,
}

#[derive(Debug, Deserialize)]
struct XmlTitles {
    #[serde(rename = "Title", default)]
    titles: Vec<XmlTitle>,
}

#[derive(Debug, Deserialize)]
struct XmlTitle {
    #[serde(rename = "TitleFull")]
    title_full: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlIdentifiers {
    #[serde(rename = "Identifier", default)]
    identifiers: Vec<XmlIdentifier>,
}

#[derive(Debug, Deserialize)]
struct XmlIdentifier {
    #[serde(rename = "Type")]
    identifier_type: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlSubjects {
    #[serde(rename = "Subject", default)]
    subjects: Vec<XmlSubject>,
}

#[derive(Debug, Deserialize)]
struct XmlSubject {
    #[serde(rename = "SubjectFull")]
    subject_full: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlLanguages {
    #[serde(rename = "Language", default)]
    languages: Vec<XmlLanguage>,
}

#[derive(Debug, Deserialize)]
struct XmlLanguage {
    #[serde(rename = "Text")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlPhysicalDescription {
    #[serde(rename = "Pagination")]
    pagination: Option<XmlPagination>,
}

#[derive(Debug, Deserialize)]
struct XmlPagination {
    #[serde(rename = "PageCount")]
    page_count: Option<String>,
    #[serde(rename = "StartPage")]
    start_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlDates {
    #[serde(rename = "Date", default)]
    dates: Vec<XmlDate>,
}

#[derive(Debug, Deserialize)]
struct XmlDate {
    #[serde(rename = "Y")]
    y: Option<String>,
    #[serde(rename = "M")]
    m: Option<String>,
    #[serde(rename = "D")]
    d: Option<String>,
    #[serde(rename = "Type")]
    date_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlNumbering {
    #[serde(rename = "Number", default)]
    numbers: Vec<XmlNumber>,
}

#[derive(Debug, Deserialize)]
struct XmlNumber {
    #[serde(rename = "Type")]
    number_type: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlBibRelationships {
    #[serde(rename = "IsPartOfRelationships")]
    is_part_of_relationships: Option<XmlIsPartOfRelationships>,
}

#[derive(Debug, Deserialize)]
struct XmlIsPartOfRelationships {
    #[serde(rename = "IsPartOf", default)]
    is_part_of: Vec<XmlIsPartOf>,
}

#[derive(Debug, Deserialize)]
struct XmlIsPartOf {
    #[serde(rename = "BibEntity")]
    bib_entity: Option<XmlBibEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;

    fn engine() -> EbscoEngine {
        EbscoEngine::new(
            EbscoConfig {
                base_url: "http://localhost/edsapi/rest".into(),
                profile: "edsapi".into(),
                guest: true,
            },
            HttpClient::new().unwrap(),
        )
    }

    const SEARCH_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SearchResponseMessageGet>
  <SearchResult>
    <Statistics><TotalHits>1266</TotalHits></Statistics>
    <Data>
      <Records>
        <Record>
          <Header><DbId>edsmzh</DbId><An>1993066095</An></Header>
          <PLink>http://search.ebscohost.com/login.aspx?direct=true&amp;db=edsmzh&amp;AN=1993066095</PLink>
          <ImageInfo>
            <CoverArt><Size>thumb</Size><Target>http://images.example.com/thumb.jpg</Target></CoverArt>
          </ImageInfo>
          <FullText>
            <Text><Availability>1</Availability><Value>&lt;anid&gt;0001&lt;/anid&gt;&lt;bold&gt;Intro&lt;/bold&gt; body text</Value></Text>
            <Links><Link><Type>pdflink</Type><Url>http://content.example.com/full.pdf</Url></Link></Links>
          </FullText>
          <Items>
            <Item><Name>Title</Name><Data>Moveable types</Data></Item>
            <Item><Name>TitleSource</Name><Data>&lt;searchLink fieldCode="JN"&gt;Harper's Magazine&lt;/searchLink&gt;</Data></Item>
            <Item><Name>TypeDocument</Name><Data>Article</Data></Item>
            <Item><Name>Author</Name><Data>&lt;searchLink fieldCode="AR" term="Grafton"&gt;Grafton, Anthony&lt;/searchLink&gt;</Data></Item>
            <Item><Name>Abstract</Name><Data>On the history of printing.</Data></Item>
          </Items>
          <RecordInfo>
            <BibRecord>
              <BibEntity>
                <Titles><Title><TitleFull>Moveable types</TitleFull><Type>main</Type></Title></Titles>
                <Identifiers><Identifier><Type>doi</Type><Value>10.1000/test.doi</Value></Identifier></Identifiers>
                <Subjects>
                  <Subject><SubjectFull>Printing -- History</SubjectFull></Subject>
                  <Subject><SubjectFull>Typography</SubjectFull></Subject>
                </Subjects>
                <Languages><Language><Text>English</Text></Language></Languages>
                <PhysicalDescription><Pagination><PageCount>13</PageCount><StartPage>11</StartPage></Pagination></PhysicalDescription>
              </BibEntity>
              <BibRelationships>
                <IsPartOfRelationships>
                  <IsPartOf>
                    <BibEntity>
                      <Dates><Date><D>01</D><M>3</M><Y>1993</Y><Type>published</Type></Date></Dates>
                      <Numbering>
                        <Number><Type>volume</Type><Value>31</Value></Number>
                        <Number><Type>issue</Type><Value>1</Value></Number>
                      </Numbering>
                      <Titles><Title><TitleFull>Journal of Typographic Research</TitleFull><Type>main</Type></Title></Titles>
                    </BibEntity>
                  </IsPartOf>
                </IsPartOfRelationships>
              </BibRelationships>
            </BibRecord>
          </RecordInfo>
        </Record>
      </Records>
    </Data>
    <AvailableFacets>
      <AvailableFacet>
        <Id>SourceType</Id><Label>Source Type</Label>
        <AvailableFacetValues>
          <AvailableFacetValue><Value>Academic Journals</Value><Count>1043</Count></AvailableFacetValue>
          <AvailableFacetValue><Value>Magazines</Value><Count>120</Count></AvailableFacetValue>
        </AvailableFacetValues>
      </AvailableFacet>
    </AvailableFacets>
  </SearchResult>
</SearchResponseMessageGet>"#;

    #[test]
    fn test_id_roundtrip() {
        let id = EbscoId::parse("edsmzh:1993066095").unwrap();
        assert_eq!(id.dbid, "edsmzh");
        assert_eq!(id.accession, "1993066095");
        assert_eq!(id.to_string(), "edsmzh:1993066095");
    }

    #[test]
    fn test_id_encoded_roundtrip() {
        let id = EbscoId::new("edsgcl", "edsgcl.424476310");
        let encoded = id.encode();
        assert!(!encoded.contains(':'));
        assert!(!encoded.contains('.'));
        let decoded = EbscoId::parse(&encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_id_rejects_malformed() {
        assert!(EbscoId::parse("no-colon-here").is_err());
        assert!(EbscoId::parse(":accession").is_err());
        assert!(EbscoId::parse("dbid:").is_err());
    }

    #[test]
    fn test_scrub_roundtrip() {
        let raw = "model (v1.2): alpha, beta";
        let scrubbed = scrub(raw);
        assert_eq!(scrubbed, r"model \(v1.2\)\: alpha\, beta");
        assert_eq!(unscrub(&scrubbed), raw);
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let raw = "a:b,(c)";
        assert_eq!(scrub(&scrub(raw)), scrub(raw));
    }

    #[test]
    fn test_clamp_to_last_page() {
        // Reported total shrank to 73 after de-dup; page 9 of 10 now
        // points past the end.
        assert_eq!(clamp_to_last_page(9, 10, 73), 8);
        // Last partial page is fine as-is
        assert_eq!(clamp_to_last_page(8, 10, 73), 8);
        assert_eq!(clamp_to_last_page(1, 10, 0), 1);
    }

    #[test]
    fn test_search_field_mapping() {
        let engine = engine();
        assert_eq!(engine.search_field("title"), "TI");
        assert_eq!(engine.search_field("author"), "AU");
        assert_eq!(engine.search_field("subject"), "SU");
        assert_eq!(engine.search_field("anything-else"), "TX");
        assert_eq!(engine.search_field(""), "TX");
    }

    #[test]
    fn test_date_format() {
        let engine = engine();
        assert_eq!(engine.date_format("1999", DateAnchor::Start), "1999-01");
        assert_eq!(engine.date_format("1999", DateAnchor::End), "1999-12");
        assert_eq!(engine.date_format("1999-5", DateAnchor::End), "1999-05");
        assert_eq!(engine.date_format("2001-11-03", DateAnchor::Start), "2001-11");
    }

    #[test]
    fn test_build_search_query() {
        let engine = engine();
        let params = SearchParams::new("city: a history")
            .field("title")
            .facet("SubjectEDS", "printing, early")
            .facet("tlevel", "peer_reviewed")
            .sort("date")
            .page(2, 20)
            .date_range(DateRange::new("1990", "2001"));

        let query = engine.build_search_query(&params);
        let get = |name: &str| -> Vec<&str> {
            query
                .iter()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .collect()
        };

        assert_eq!(get("query-1"), vec![r"AND,TI:city\: a history"]);
        assert_eq!(get("facetfilter"), vec![r"1,SubjectEDS:printing\, early"]);
        let limiters = get("limiter");
        assert!(limiters.contains(&"RV:Y"));
        assert!(limiters.contains(&"DT1:1990-01/2001-12"));
        assert_eq!(get("sort"), vec!["date"]);
        assert_eq!(get("pagenumber"), vec!["2"]);
        assert_eq!(get("resultsperpage"), vec!["20"]);
    }

    #[test]
    fn test_parse_search_response() {
        let (total, docs, facets) = parse_search_response(SEARCH_XML).unwrap();
        assert_eq!(total, 1266);
        assert_eq!(docs.len(), 1);

        let doc = &docs[0];
        assert_eq!(doc.doc_id, "edsmzh:1993066095");
        assert_eq!(doc.title, "Moveable types");
        assert_eq!(doc.creator, "Grafton, Anthony");
        assert_eq!(doc.subjects, "Printing -- History; Typography");
        assert_eq!(doc.languages, "English");
        assert_eq!(doc.source, "Harper's Magazine");
        assert_eq!(doc.identifier, "DOI: 10.1000/test.doi");
        assert_eq!(doc.doc_type.as_deref(), Some("Article"));
        assert_eq!(doc.journal.as_deref(), Some("Journal of Typographic Research"));
        assert_eq!(doc.volume.as_deref(), Some("31"));
        assert_eq!(doc.issue.as_deref(), Some("1"));
        assert_eq!(doc.page_range.as_deref(), Some("11-23"));
        assert_eq!(doc.creation_date, "1993-03-01");
        assert_eq!(doc.links.len(), 1);
        assert_eq!(
            doc.links[0].thumbnail.as_deref(),
            Some("http://images.example.com/thumb.jpg")
        );

        let fulltext = doc.fulltext.as_ref().unwrap();
        assert_eq!(fulltext.body.as_deref(), Some("<b>Intro</b> body text"));
        assert_eq!(fulltext.format.as_deref(), Some("pdflink"));
        assert_eq!(
            fulltext.url.as_deref(),
            Some("http://content.example.com/full.pdf")
        );

        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].name, "SourceType");
        assert_eq!(facets[0].items[0].value, "Academic Journals");
        assert_eq!(facets[0].items[0].hits, 1043);
    }

    #[test]
    fn test_parse_search_response_empty_body() {
        assert!(parse_search_response("").is_err());
        assert!(parse_search_response("<SearchResponseMessageGet/>").is_err());
    }

    #[test]
    fn test_missing_date_sentinel() {
        let xml = r#"<RetrieveResponseMessage><Record>
            <Header><DbId>a9h</DbId><An>12345</An></Header>
            <Items><Item><Name>Title</Name><Data>Untitled</Data></Item></Items>
        </Record></RetrieveResponseMessage>"#;
        let doc = parse_retrieve_response(xml).unwrap();
        assert_eq!(doc.creation_date, MISSING_DATE);
    }

    #[test]
    fn test_classify_error_vendor_code() {
        let body = r#"<ErrorMessage><ErrorNumber>109</ErrorNumber><ErrorDescription>Session Token Invalid</ErrorDescription></ErrorMessage>"#;
        let err = classify_error(400, body);
        assert!(is_session_invalid(&err));
    }

    #[test]
    fn test_classify_error_http_fallback() {
        let err = classify_error(502, "Bad Gateway");
        match err {
            EngineError::Protocol { code, .. } => assert_eq!(code, 502),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_session_token() {
        let xml = r#"<CreateSessionResponse><SessionToken>abc123-def</SessionToken></CreateSessionResponse>"#;
        assert_eq!(parse_session_token(xml).unwrap(), "abc123-def");
        assert!(parse_session_token("<CreateSessionResponse/>").is_err());
    }

    #[test]
    fn test_require_token() {
        let engine = engine();
        assert!(engine.require_token(&Session::none()).is_err());
        assert_eq!(
            engine.require_token(&Session::with_token("tok")).unwrap(),
            "tok"
        );
    }

    #[test]
    fn test_pick_at_index() {
        let docs: Vec<Document> = (0..10)
            .map(|i| Document::new(format!("db:{}", i), format!("t{}", i), Provider::Ebsco))
            .collect();
        // Absolute position 13 on page 2 of 10 is the third doc of that page
        let picked = pick_at_index(docs, 13, 10);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].doc_id, "db:2");
    }
}
