//! Full-text markup rewriting and HTML sanitization.
//!
//! EBSCO ships inline full text in a semi-proprietary markup dialect
//! (`ulink`, `bold`, `olist`, `reflink`/`bibl` footnote cross-references,
//! ...). [`rewrite_markup`] translates that dialect into standard HTML via
//! an ordered substitution table, and [`sanitize_html`] then filters the
//! result through an allow-list of tags and attributes. The two passes are
//! kept separate so each is testable on its own.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Ordered tag/attribute substitutions from the EBSCO dialect to HTML.
/// Attribute-carrying rewrites come before bare tag renames so the capture
/// groups see the original attributes.
fn substitutions() -> &'static Vec<(Regex, &'static str)> {
    static TABLE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            // External links
            (r#"<ulink\s+url="([^"]*)"[^>]*>"#, r#"<a href="$1">"#),
            (r"</ulink>", "</a>"),
            // Footnote cross-references: reflink marks the in-text anchor,
            // bibl the entry it points at, each linking back to the other
            (
                r#"<reflink\s+idref="bib([^"]*)"\s+id="ref([^"]*)"[^>]*>"#,
                r##"<a href="#bib$1" id="ref$2"><sup>"##,
            ),
            (r"</reflink>", "</sup></a>"),
            (
                r#"<bibl\s+id="bib([^"]*)"\s+idref="ref([^"]*)"[^>]*>"#,
                r##"<a id="bib$1" href="#ref$2">"##,
            ),
            (r"</bibl>", "</a>"),
            // Section headings
            (r"<title\b[^>]*>", "<h3>"),
            (r"</title>", "</h3>"),
            (r"<hd\b[^>]*>", "<h3>"),
            (r"</hd>", "</h3>"),
            // Inline styling and lists
            (r"<bold>", "<b>"),
            (r"</bold>", "</b>"),
            (r"<emph>", "<i>"),
            (r"</emph>", "</i>"),
            (r"<subscript>", "<sub>"),
            (r"</subscript>", "</sub>"),
            (r"<superscript>", "<sup>"),
            (r"</superscript>", "</sup>"),
            (r"<ulist>", "<ul>"),
            (r"</ulist>", "</ul>"),
            (r"<olist>", "<ol>"),
            (r"</olist>", "</ol>"),
            (r"<blist>", "<ol>"),
            (r"</blist>", "</ol>"),
            (r"<item>", "<li>"),
            (r"</item>", "</li>"),
            // Article-id header carries no display value
            (r"<anid>[^<]*</anid>", ""),
        ]
        .iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("substitution table pattern"),
                *replacement,
            )
        })
        .collect()
    })
}

/// Tags allowed through the sanitizer, with the attributes each may keep.
/// Extended beyond a minimal set because rewritten full text legitimately
/// carries headings, lists, tables and footnote anchors.
fn allowed_tags() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static ALLOWED: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    ALLOWED.get_or_init(|| {
        let mut map: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        map.insert("a", &["href", "id", "name"]);
        map.insert("img", &["src", "alt"]);
        map.insert("span", &["id", "class"]);
        map.insert("p", &["id"]);
        for tag in [
            "b", "i", "em", "strong", "sub", "sup", "br", "hr", "ul", "ol", "li", "dl", "dt",
            "dd", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "thead",
            "tbody", "tr", "td", "th",
        ] {
            map.insert(tag, &["id"]);
        }
        map
    })
}

/// Rewrite the EBSCO full-text dialect into standard HTML.
pub fn rewrite_markup(input: &str) -> String {
    let mut out = input.to_string();
    for (pattern, replacement) in substitutions() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Filter HTML through the allow-list: unknown tags are dropped (their
/// text content survives), allowed tags keep only their allowed
/// attributes, and `javascript:` URLs are removed.
pub fn sanitize_html(input: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let tag_re = TAG.get_or_init(|| {
        Regex::new(r"(?s)<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)((?:[^<>])*?)(/?)\s*>")
            .expect("tag pattern")
    });
    let attr_re = ATTR.get_or_init(|| {
        Regex::new(r#"([a-zA-Z][a-zA-Z0-9-]*)\s*=\s*"([^"]*)""#).expect("attr pattern")
    });

    tag_re
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let closing = &caps[1];
            let name = caps[2].to_lowercase();
            let attrs = &caps[3];
            let self_closing = &caps[4];

            let allowed_attrs = match allowed_tags().get(name.as_str()) {
                Some(attrs) => *attrs,
                None => return String::new(),
            };

            if !closing.is_empty() {
                return format!("</{}>", name);
            }

            let mut kept = String::new();
            for attr in attr_re.captures_iter(attrs) {
                let attr_name = attr[1].to_lowercase();
                let value = &attr[2];
                if !allowed_attrs.contains(&attr_name.as_str()) {
                    continue;
                }
                if (attr_name == "href" || attr_name == "src")
                    && value.trim().to_lowercase().starts_with("javascript:")
                {
                    continue;
                }
                kept.push_str(&format!(r#" {}="{}""#, attr_name, value));
            }

            format!("<{}{}{}>", name, kept, self_closing)
        })
        .into_owned()
}

/// Rewrite then sanitize a full-text body in one call.
pub fn sanitize_fulltext(input: &str) -> String {
    sanitize_html(&rewrite_markup(input))
}

/// Remove all markup, keeping text content. Used for display fields that
/// arrive with embedded vendor markup but render as plain strings.
pub fn strip_tags(input: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let re = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("strip pattern"));
    re.replace_all(input, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_ulink() {
        let input = r#"See <ulink url="http://example.com/a">the site</ulink>."#;
        assert_eq!(
            rewrite_markup(input),
            r#"See <a href="http://example.com/a">the site</a>."#
        );
    }

    #[test]
    fn test_rewrite_reflink_bibl_pair() {
        let input = r#"claim<reflink idref="bib1" id="ref1">1</reflink> ... <bibl id="bib1" idref="ref1">Smith 1990</bibl>"#;
        let out = rewrite_markup(input);
        assert!(out.contains(r##"<a href="#bib1" id="ref1"><sup>1</sup></a>"##));
        assert!(out.contains(r##"<a id="bib1" href="#ref1">Smith 1990</a>"##));
    }

    #[test]
    fn test_rewrite_lists_and_styling() {
        let input = "<bold>x</bold> <olist><item>one</item></olist>";
        assert_eq!(rewrite_markup(input), "<b>x</b> <ol><li>one</li></ol>");
    }

    #[test]
    fn test_anid_removed() {
        assert_eq!(rewrite_markup("<anid>03049366</anid>Body"), "Body");
    }

    #[test]
    fn test_sanitize_drops_unknown_tags() {
        let input = "<script>alert(1)</script><b>bold</b><widget attr=\"x\">text</widget>";
        assert_eq!(sanitize_html(input), "alert(1)<b>bold</b>text");
    }

    #[test]
    fn test_sanitize_filters_attributes() {
        let input = r#"<a href="http://x" onclick="steal()" id="r1">link</a>"#;
        assert_eq!(
            sanitize_html(input),
            r#"<a href="http://x" id="r1">link</a>"#
        );
    }

    #[test]
    fn test_sanitize_blocks_javascript_urls() {
        let input = r#"<a href="javascript:alert(1)">x</a>"#;
        assert_eq!(sanitize_html(input), "<a>x</a>");
    }

    #[test]
    fn test_full_pipeline() {
        let input = r#"<anid>0001</anid><title>Heading</title><bold>B</bold> <ulink url="http://e.com">e</ulink>"#;
        assert_eq!(
            sanitize_fulltext(input),
            r#"<h3>Heading</h3><b>B</b> <a href="http://e.com">e</a>"#
        );
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<i>Journal</i> of <b>Tests</b>"), "Journal of Tests");
        assert_eq!(strip_tags("plain"), "plain");
    }
}
