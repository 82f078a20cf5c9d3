//! Ex Libris Primo Central adapter.
//!
//! Plain HTTP GET against the X-Services brief-search endpoint; responses
//! are XML mapped into explicit structs. No session handshake.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::config::PrimoConfig;
use crate::engines::{degrade, DateAnchor, Engine, EngineError, Session};
use crate::models::{
    compute_paging, Document, DocumentBuilder, Facet, FacetItem, FullText, Link, Provider,
    Response, SearchParams,
};
use crate::utils::HttpClient;

/// Hard vendor ceiling: Primo Central refuses offsets past this many
/// results regardless of the reported total.
const MAX_ACCESSIBLE_RESULTS: u64 = 2000;

/// Creation-date value when the vendor omits the publication date.
/// Distinct from EBSCO's `"0"` and Summon's `"1000"` by design of the
/// downstream display logic.
const MISSING_DATE: &str = "";

/// Backslash-escape `,`, `(`, `)` in a term; commas separate the
/// field/precision/term triple in Primo query parameters.
pub(crate) fn scrub(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for ch in value.chars() {
        if !escaped && matches!(ch, ',' | '(' | ')') {
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
        if ch == '\\' && matches!(chars.peek(), Some(',' | '(' | ')')) {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Primo Central engine
#[derive(Debug, Clone)]
pub struct PrimoEngine {
    config: PrimoConfig,
    client: HttpClient,
}

impl PrimoEngine {
    /// Create a new Primo engine
    pub fn new(config: PrimoConfig, client: HttpClient) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/xservice/search/brief",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the brief-search query as (name, value) pairs
    fn build_search_query(&self, params: &SearchParams) -> Vec<(String, String)> {
        let mut query = vec![(
            "institution".to_string(),
            self.config.institution.clone(),
        )];

        // A blank main query with a populated subject facet substitutes a
        // subject-scoped query, so empty-box subject browses still work.
        let subject_values = params.facets.get("subject").map(Vec::as_slice).unwrap_or(&[]);
        if params.query.trim().is_empty() && !subject_values.is_empty() {
            query.push((
                "query".to_string(),
                format!("sub,contains,{}", scrub(&subject_values[0])),
            ));
        } else {
            let field = self.search_field(params.field.as_deref().unwrap_or(""));
            query.push((
                "query".to_string(),
                format!("{},contains,{}", field, scrub(&params.query)),
            ));
        }

        let mut facet_names: Vec<&String> = params.facets.keys().collect();
        facet_names.sort();
        for name in facet_names {
            if name == "subject" {
                continue;
            }
            let facet_field = if name.starts_with("facet_") {
                name.clone()
            } else {
                format!("facet_{}", name)
            };
            for value in &params.facets[name] {
                query.push((
                    "query".to_string(),
                    format!("{},exact,{}", facet_field, scrub(value)),
                ));
            }
        }

        if let Some(range) = &params.date_range {
            if !range.is_empty() {
                let from = self.date_format(range.from.as_deref().unwrap_or("0"), DateAnchor::Start);
                let to = match &range.to {
                    Some(to) => self.date_format(to, DateAnchor::End),
                    None => self.date_format(range.from.as_deref().unwrap_or("0"), DateAnchor::End),
                };
                query.push((
                    "query".to_string(),
                    format!("facet_creationdate,exact,[{} TO {}]", from, to),
                ));
            }
        }

        if let Some(sort) = params.sort.as_deref() {
            let sort_field = match sort {
                "date" => "scdate",
                "author" => "screator",
                "title" => "stitle",
                _ => "",
            };
            if !sort_field.is_empty() {
                query.push(("sortField".to_string(), sort_field.to_string()));
            }
        }

        let (start, per_page) = start_for(params);
        query.push(("indx".to_string(), (start + 1).to_string()));
        query.push(("bulkSize".to_string(), per_page.to_string()));

        query
    }

    async fn fetch(&self, query: &[(String, String)]) -> Result<String, EngineError> {
        let response = self
            .client
            .get(&self.endpoint())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::Protocol {
                code: i32::from(status.as_u16()),
                message: format!("Primo returned HTTP {}", status),
            });
        }
        Ok(body)
    }

    async fn run_search(&self, params: &SearchParams) -> Result<Response, EngineError> {
        let query = self.build_search_query(params);
        let (start, per_page) = start_for(params);

        let body = self.fetch(&query).await?;
        let parsed = match parse_brief_response(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Exactly one silent re-issue of the identical request:
                // truncated payloads missing their paging accessors have
                // been observed to heal on the next read. Not a loop.
                tracing::debug!(error = %err, "Primo payload unusable, re-issuing once");
                let body = self.fetch(&query).await?;
                parse_brief_response(&body)?
            }
        };

        let paging = compute_paging(parsed.total, per_page, start, MAX_ACCESSIBLE_RESULTS);
        let docs = match params.index {
            Some(index) => {
                let per = u64::from(per_page);
                let offset = ((index.max(1) - 1) % per) as usize;
                parsed.docs.into_iter().skip(offset).take(1).collect()
            }
            None => parsed.docs,
        };

        Ok(Response::new(
            Provider::Primo,
            docs,
            parsed.facets,
            parsed.total,
            paging,
        ))
    }
}

/// 0-based start offset and page size a request resolves to
fn start_for(params: &SearchParams) -> (u64, u32) {
    let per_page = params.per_page.max(1);
    match params.index {
        Some(index) => {
            let per = u64::from(per_page);
            let page = index.max(1).div_ceil(per);
            ((page - 1) * per, per_page)
        }
        None => (
            u64::from(params.page.max(1) - 1) * u64::from(per_page),
            per_page,
        ),
    }
}

#[async_trait]
impl Engine for PrimoEngine {
    fn provider(&self) -> Provider {
        Provider::Primo
    }

    fn max_accessible_results(&self) -> u64 {
        MAX_ACCESSIBLE_RESULTS
    }

    async fn start_session(&self, _as_guest: bool) -> Result<Session, EngineError> {
        Ok(Session::none())
    }

    fn search_field(&self, generic: &str) -> &'static str {
        match generic {
            "title" => "title",
            "author" | "creator" => "creator",
            "subject" => "sub",
            "issn" => "issn",
            "isbn" => "isbn",
            _ => "any",
        }
    }

    /// Primo ranges take bare years: `[YYYY TO YYYY]`
    fn date_format(&self, value: &str, _anchor: DateAnchor) -> String {
        value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect()
    }

    async fn search(&self, params: &SearchParams) -> Result<Response, EngineError> {
        let (start, per_page) = start_for(params);

        // The vendor rejects offsets past the ceiling; don't ask.
        if start >= MAX_ACCESSIBLE_RESULTS {
            tracing::debug!(start, "Primo offset past ceiling, returning empty response");
            return Ok(Response::empty(Provider::Primo, per_page));
        }

        self.run_search(params)
            .await
            .or_else(|err| degrade(Provider::Primo, per_page, err))
    }

    async fn lookup_by_id(&self, id: &str, _params: &SearchParams) -> Result<Response, EngineError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::InvalidRequest("Empty Primo record id".into()));
        }

        let query = vec![
            ("institution".to_string(), self.config.institution.clone()),
            ("query".to_string(), format!("rid,exact,{}", scrub(id))),
            ("indx".to_string(), "1".to_string()),
            ("bulkSize".to_string(), "1".to_string()),
        ];

        let outcome = async {
            let body = self.fetch(&query).await?;
            let parsed = match parse_brief_response(&body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::debug!(error = %err, "Primo payload unusable, re-issuing once");
                    let body = self.fetch(&query).await?;
                    parse_brief_response(&body)?
                }
            };
            let paging = compute_paging(parsed.total.min(1), 1, 0, MAX_ACCESSIBLE_RESULTS);
            Ok(Response::new(
                Provider::Primo,
                parsed.docs.into_iter().take(1).collect(),
                Vec::new(),
                parsed.total.min(1),
                paging,
            ))
        }
        .await;

        outcome.or_else(|err| degrade(Provider::Primo, 1, err))
    }
}

struct ParsedBrief {
    total: u64,
    docs: Vec<Document>,
    facets: Vec<Facet>,
}

/// Parse a brief-search payload. A structurally-valid document that lacks
/// the paging accessors (no DOCSET, no TOTALHITS) counts as a parse
/// failure so the caller's single-retry rule applies.
fn parse_brief_response(xml: &str) -> Result<ParsedBrief, EngineError> {
    let parsed: XmlSegments = from_str(xml)?;
    let result = parsed
        .jagroot
        .and_then(|j| j.result)
        .ok_or_else(|| EngineError::Parse("Primo response without RESULT".into()))?;

    let docset = result
        .docset
        .ok_or_else(|| EngineError::Parse("Primo response without DOCSET".into()))?;
    let total = docset
        .total_hits
        .ok_or_else(|| EngineError::Parse("Primo DOCSET without TOTALHITS".into()))?;

    let docs = docset
        .docs
        .into_iter()
        .filter_map(normalize_doc)
        .collect();

    let facets = result
        .facet_list
        .map(|fl| fl.facets)
        .unwrap_or_default()
        .into_iter()
        .map(|facet| {
            let items = facet
                .values
                .into_iter()
                .map(|v| FacetItem::new(v.key.unwrap_or_default(), v.value.unwrap_or(0)))
                .collect();
            Facet::new(facet.name.unwrap_or_default(), items)
        })
        .collect();

    Ok(ParsedBrief {
        total,
        docs,
        facets,
    })
}

/// Flatten one PrimoNMBib record into the canonical model
fn normalize_doc(doc: XmlDoc) -> Option<Document> {
    let record = doc.primo_record?.record?;
    let control = record.control?;
    let record_id = control.record_id?;
    if record_id.is_empty() {
        return None;
    }

    let display = record.display.unwrap_or_default();
    let addata = record.addata.unwrap_or_default();
    let search = record.search.unwrap_or_default();

    let creation_date = search
        .creation_date
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| MISSING_DATE.to_string());

    let mut builder = DocumentBuilder::new(
        record_id,
        display.title.unwrap_or_default(),
        Provider::Primo,
    )
    .creator(display.creator.unwrap_or_default())
    .subjects(display.subject.unwrap_or_default())
    .languages(display.language.unwrap_or_default())
    .source(display.is_part_of.unwrap_or_default())
    .identifier(display.identifier.unwrap_or_default())
    .abstract_text(display.description.unwrap_or_default())
    .creation_date(creation_date);

    if let Some(doc_type) = display.doc_type.filter(|t| !t.is_empty()) {
        builder = builder.doc_type(doc_type);
    }
    if let Some(journal) = addata.jtitle.filter(|j| !j.is_empty()) {
        builder = builder.journal(journal);
    }
    if let Some(volume) = addata.volume.filter(|v| !v.is_empty()) {
        builder = builder.volume(volume);
    }
    if let Some(issue) = addata.issue.filter(|i| !i.is_empty()) {
        builder = builder.issue(issue);
    }
    if let (Some(spage), epage) = (addata.spage.filter(|p| !p.is_empty()), addata.epage) {
        let pages = match epage.filter(|p| !p.is_empty()) {
            Some(epage) => format!("{}-{}", spage, epage),
            None => spage,
        };
        builder = builder.page_range(pages);
    }

    for term in search.subjects {
        if !term.is_empty() {
            builder = builder.subject_facet(term);
        }
    }

    if let Some(links) = doc.links {
        if let Some(url) = links.openurl.filter(|u| !u.is_empty()) {
            let mut link = Link::new(url, "View online");
            if let Some(thumb) = links.thumbnail.clone().filter(|t| !t.is_empty()) {
                link = link.thumbnail(thumb);
            }
            builder = builder.link(link);
        }
        if let Some(url) = links.link_to_source.filter(|u| !u.is_empty()) {
            builder = builder.fulltext(FullText {
                body: None,
                format: None,
                url: Some(url),
            });
        }
    }

    Some(builder.build())
}

// ===== Primo X-Services API Types =====

#[derive(Debug, Deserialize)]
struct XmlSegments {
    #[serde(rename = "JAGROOT")]
    jagroot: Option<XmlJagroot>,
}

#[derive(Debug, Deserialize)]
struct XmlJagroot {
    #[serde(rename = "RESULT")]
    result: Option<XmlResult>,
}

#[derive(Debug, Deserialize)]
struct XmlResult {
    #[serde(rename = "DOCSET")]
    docset: Option<XmlDocset>,
    #[serde(rename = "FACETLIST")]
    facet_list: Option<XmlFacetList>,
}

#[derive(Debug, Deserialize)]
struct XmlDocset {
    #[serde(rename = "@TOTALHITS")]
    total_hits: Option<u64>,
    #[serde(rename = "DOC", default)]
    docs: Vec<XmlDoc>,
}

#[derive(Debug, Deserialize)]
struct XmlDoc {
    #[serde(rename = "PrimoNMBib")]
    primo_record: Option<XmlPrimoNMBib>,
    #[serde(rename = "LINKS")]
    links: Option<XmlLinks>,
}

#[derive(Debug, Deserialize)]
struct XmlPrimoNMBib {
    #[serde(rename = "record")]
    record: Option<XmlBibRecord>,
}

#[derive(Debug, Deserialize)]
struct XmlBibRecord {
    #[serde(rename = "control")]
    control: Option<XmlControl>,
    #[serde(rename = "display")]
    display: Option<XmlDisplay>,
    #[serde(rename = "addata")]
    addata: Option<XmlAddata>,
    #[serde(rename = "search")]
    search: Option<XmlSearchData>,
}

#[derive(Debug, Deserialize)]
struct XmlControl {
    #[serde(rename = "recordid")]
    record_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlDisplay {
    title: Option<String>,
    creator: Option<String>,
    subject: Option<String>,
    language: Option<String>,
    #[serde(rename = "ispartof")]
    is_part_of: Option<String>,
    identifier: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlAddata {
    jtitle: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    spage: Option<String>,
    epage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlSearchData {
    #[serde(rename = "creationdate")]
    creation_date: Option<String>,
    #[serde(rename = "subject", default)]
    subjects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct XmlLinks {
    #[serde(rename = "openurl")]
    openurl: Option<String>,
    #[serde(rename = "thumbnail")]
    thumbnail: Option<String>,
    #[serde(rename = "linktorsrc")]
    link_to_source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlFacetList {
    #[serde(rename = "FACET", default)]
    facets: Vec<XmlFacet>,
}

#[derive(Debug, Deserialize)]
struct XmlFacet {
    #[serde(rename = "@NAME")]
    name: Option<String>,
    #[serde(rename = "FACET_VALUES", default)]
    values: Vec<XmlFacetValue>,
}

#[derive(Debug, Deserialize)]
struct XmlFacetValue {
    #[serde(rename = "@KEY")]
    key: Option<String>,
    #[serde(rename = "@VALUE")]
    value: Option<u64>,
}
