//! Canonical document model shared by all provider adapters.

use serde::{Deserialize, Serialize};

/// The article-search vendor a record or response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ebsco,
    Primo,
    Summon,
}

impl Provider {
    /// Returns the display name of the provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ebsco => "EBSCO EDS",
            Provider::Primo => "Primo Central",
            Provider::Summon => "Summon",
        }
    }

    /// Returns the provider identifier (for config and CLI selection)
    pub fn id(&self) -> &'static str {
        match self {
            Provider::Ebsco => "ebsco",
            Provider::Primo => "primo",
            Provider::Summon => "summon",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ebsco" | "eds" => Ok(Provider::Ebsco),
            "primo" => Ok(Provider::Primo),
            "summon" => Ok(Provider::Summon),
            other => Err(format!("Unknown provider '{}'", other)),
        }
    }
}

/// An outbound link attached to a document (full text, vendor record page,
/// thumbnail carrier, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Target URL
    pub url: String,

    /// Human-readable label
    pub label: String,

    /// Optional thumbnail image URL shown next to the link
    pub thumbnail: Option<String>,
}

impl Link {
    /// Create a new link without a thumbnail
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            thumbnail: None,
        }
    }

    /// Set the thumbnail URL
    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Full-text / download metadata for a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullText {
    /// Sanitized HTML body, when the vendor ships the text inline
    pub body: Option<String>,

    /// Download format reported by the vendor (e.g. "pdf", "ebook-epub")
    pub format: Option<String>,

    /// Direct download URL, when available
    pub url: Option<String>,
}

/// A single article record normalized from any provider
///
/// Documents are owned by exactly one [`Response`](crate::models::Response),
/// rebuilt on every request, and never persisted. Multi-valued display
/// fields are semicolon-joined strings; use the `*_list` accessors to split
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Provider-scoped identifier, reusable as a lookup key
    pub doc_id: String,

    /// Provider the record came from
    pub provider: Provider,

    /// Title for display
    pub title: String,

    /// Creators/authors (semicolon-separated)
    pub creator: String,

    /// Subject headings (semicolon-separated)
    pub subjects: String,

    /// Languages (semicolon-separated)
    pub languages: String,

    /// Source/container title as the vendor displays it
    pub source: String,

    /// Identifier display string (DOI, ISSN, ... as reported)
    pub identifier: String,

    /// Abstract text, when the vendor ships one
    pub r#abstract: String,

    /// Document type as the vendor reports it ("Article", "Book Review", ...)
    pub doc_type: Option<String>,

    /// Journal title
    pub journal: Option<String>,

    /// Volume
    pub volume: Option<String>,

    /// Issue
    pub issue: Option<String>,

    /// Page range (e.g. "11-23")
    pub page_range: Option<String>,

    /// Creation/publication date. Providers use different defaults when the
    /// vendor omits the date ("0" for EBSCO, "" for Primo, "1000" for
    /// Summon); those sentinels are preserved as-is.
    pub creation_date: String,

    /// Subject facet terms attached to the record itself
    pub subject_facets: Vec<String>,

    /// Outbound links
    pub links: Vec<Link>,

    /// Full-text / download metadata
    pub fulltext: Option<FullText>,
}

impl Document {
    /// Create a new document with required fields
    pub fn new(doc_id: String, title: String, provider: Provider) -> Self {
        Self {
            doc_id,
            provider,
            title,
            creator: String::new(),
            subjects: String::new(),
            languages: String::new(),
            source: String::new(),
            identifier: String::new(),
            r#abstract: String::new(),
            doc_type: None,
            journal: None,
            volume: None,
            issue: None,
            page_range: None,
            creation_date: String::new(),
            subject_facets: Vec::new(),
            links: Vec::new(),
            fulltext: None,
        }
    }

    /// Returns the creators as a vector
    pub fn creator_list(&self) -> Vec<&str> {
        split_joined(&self.creator)
    }

    /// Returns the subject headings as a vector
    pub fn subject_list(&self) -> Vec<&str> {
        split_joined(&self.subjects)
    }

    /// Returns the languages as a vector
    pub fn language_list(&self) -> Vec<&str> {
        split_joined(&self.languages)
    }

    /// Check whether the vendor shipped an inline full-text body
    pub fn has_fulltext(&self) -> bool {
        self.fulltext
            .as_ref()
            .map(|ft| ft.body.is_some() || ft.url.is_some())
            .unwrap_or(false)
    }
}

fn split_joined(joined: &str) -> Vec<&str> {
    joined
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Builder for constructing Document objects
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Document,
}

impl DocumentBuilder {
    /// Create a new builder with required fields
    pub fn new(doc_id: impl Into<String>, title: impl Into<String>, provider: Provider) -> Self {
        Self {
            doc: Document::new(doc_id.into(), title.into(), provider),
        }
    }

    /// Set creators
    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.doc.creator = creator.into();
        self
    }

    /// Set subject headings
    pub fn subjects(mut self, subjects: impl Into<String>) -> Self {
        self.doc.subjects = subjects.into();
        self
    }

    /// Set languages
    pub fn languages(mut self, languages: impl Into<String>) -> Self {
        self.doc.languages = languages.into();
        self
    }

    /// Set the source/container display string
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.doc.source = source.into();
        self
    }

    /// Set the identifier display string
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.doc.identifier = identifier.into();
        self
    }

    /// Set abstract text
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.doc.r#abstract = text.into();
        self
    }

    /// Set the vendor-reported document type
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc.doc_type = Some(doc_type.into());
        self
    }

    /// Set journal title
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.doc.journal = Some(journal.into());
        self
    }

    /// Set volume
    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.doc.volume = Some(volume.into());
        self
    }

    /// Set issue
    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.doc.issue = Some(issue.into());
        self
    }

    /// Set page range
    pub fn page_range(mut self, pages: impl Into<String>) -> Self {
        self.doc.page_range = Some(pages.into());
        self
    }

    /// Set creation date (provider sentinel defaults included)
    pub fn creation_date(mut self, date: impl Into<String>) -> Self {
        self.doc.creation_date = date.into();
        self
    }

    /// Add a subject facet term
    pub fn subject_facet(mut self, term: impl Into<String>) -> Self {
        self.doc.subject_facets.push(term.into());
        self
    }

    /// Add a link
    pub fn link(mut self, link: Link) -> Self {
        self.doc.links.push(link);
        self
    }

    /// Set full-text metadata
    pub fn fulltext(mut self, fulltext: FullText) -> Self {
        self.doc.fulltext = Some(fulltext);
        self
    }

    /// Build the Document
    pub fn build(self) -> Document {
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = DocumentBuilder::new("edsmzh:1993066095", "Test Article", Provider::Ebsco)
            .creator("John Doe; Jane Smith")
            .subjects("History; Printing")
            .journal("Journal of Tests")
            .volume("12")
            .issue("3")
            .page_range("11-23")
            .creation_date("2019")
            .link(Link::new("http://example.com/rec", "View record"))
            .build();

        assert_eq!(doc.doc_id, "edsmzh:1993066095");
        assert_eq!(doc.provider, Provider::Ebsco);
        assert_eq!(doc.creator_list(), vec!["John Doe", "Jane Smith"]);
        assert_eq!(doc.subject_list(), vec!["History", "Printing"]);
        assert_eq!(doc.journal.as_deref(), Some("Journal of Tests"));
        assert_eq!(doc.links.len(), 1);
        assert!(!doc.has_fulltext());
    }

    #[test]
    fn test_provider_roundtrip() {
        for p in [Provider::Ebsco, Provider::Primo, Provider::Summon] {
            let parsed: Provider = p.id().parse().unwrap();
            assert_eq!(parsed, p);
        }
        assert!("voyager".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::Ebsco.to_string(), "EBSCO EDS");
        assert_eq!(Provider::Summon.to_string(), "Summon");
    }

    #[test]
    fn test_has_fulltext() {
        let mut doc = Document::new("id".into(), "t".into(), Provider::Summon);
        assert!(!doc.has_fulltext());

        doc.fulltext = Some(FullText {
            body: None,
            format: Some("pdf".into()),
            url: None,
        });
        assert!(!doc.has_fulltext());

        doc.fulltext = Some(FullText {
            body: None,
            format: Some("pdf".into()),
            url: Some("http://example.com/dl".into()),
        });
        assert!(doc.has_fulltext());
    }
}
