//! Citation extraction
//!
//! Turns free-form model output into a deduplicated list of file references.
//! Each citation convention is a [`CitationMatcher`]; the [`CitationExtractor`]
//! runs them in a fixed order and keeps the first match for every path.
//!
//! Pass order (decides which match wins for a duplicated path):
//! 1. Markdown links `[label](path.ext)`
//! 2. Parenthetical references `(Source: path, page N)`
//! 3. Footnotes `[N] path` / `[N]: path (page M)`
//! 4. XML-style tags `<source path="..." page="N" title="..."/>`
//! 5. Bare volume paths, one pass per configured prefix
//! 6. Quoted file names `"report.pdf"`
//! 7. Structured sources supplied by the caller

mod file_type;
pub mod matchers;

pub use file_type::{
    extension, file_name, is_url, label_for, looks_like_path, normalize_path, FileType,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::CitationConfig;
use matchers::{
    FootnoteMatcher, MarkdownLinkMatcher, ParentheticalMatcher, QuotedFileMatcher,
    VolumePathMatcher, XmlTagMatcher,
};

/// A resolved reference to an external document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub id: String,
    pub label: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_number: Option<u32>,
}

/// One raw hit produced by a matcher, before normalization and dedup
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub path: String,
    pub label: Option<String>,
    pub page: Option<u32>,
    pub ref_number: Option<u32>,
    /// Byte range of the whole match in the scanned text
    pub span: Range<usize>,
    /// Text scanned for a page number when the pattern captured none
    pub anchor: String,
}

impl MatchCandidate {
    pub fn new(path: impl Into<String>, span: Range<usize>, anchor: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: None,
            page: None,
            ref_number: None,
            span,
            anchor: anchor.into(),
        }
    }
}

/// A single citation convention
pub trait CitationMatcher: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// All occurrences of this convention in `text`, in text order
    fn find(&self, text: &str) -> Vec<MatchCandidate>;
}

/// A retrieval-tool record supplied out-of-band. Field names vary between
/// tools, so the record is kept as a loose JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredSource(pub Map<String, Value>);

impl StructuredSource {
    const PATH_KEYS: &'static [&'static str] = &["path", "file", "uri", "url"];
    const LABEL_KEYS: &'static [&'static str] = &["title", "label", "name", "filename"];
    const PAGE_KEYS: &'static [&'static str] = &["page", "pageNumber", "page_number"];
    const SCORE_KEYS: &'static [&'static str] = &["score", "relevance", "similarity"];
    const CHUNK_KEYS: &'static [&'static str] = &["chunk", "chunkId", "chunk_id"];
    const SNIPPET_KEYS: &'static [&'static str] = &["snippet", "excerpt", "text", "content"];
    const REF_KEYS: &'static [&'static str] = &["refNumber", "ref_number"];

    /// First non-empty string among `keys`, in priority order
    fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .find(|s| !s.is_empty())
    }

    fn first_f64(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .filter_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .find(|f: &f64| f.is_finite())
    }

    fn first_u32(&self, keys: &[&str]) -> Option<u32> {
        self.first_f64(keys)
            .filter(|f| *f >= 1.0 && *f <= u32::MAX as f64)
            .map(|f| f as u32)
    }

    pub fn path(&self) -> Option<String> {
        self.first_str(Self::PATH_KEYS)
    }
}

impl From<Value> for StructuredSource {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => StructuredSource(map),
            _ => StructuredSource::default(),
        }
    }
}

/// Runs the registered matchers in order and folds their hits into a
/// deduplicated citation list
pub struct CitationExtractor {
    matchers: Vec<Box<dyn CitationMatcher>>,
    snippet_radius: usize,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new(&CitationConfig::default())
    }
}

impl CitationExtractor {
    pub fn new(config: &CitationConfig) -> Self {
        let mut extractor = Self {
            matchers: vec![],
            snippet_radius: config.snippet_radius,
        };

        extractor.register(Box::new(MarkdownLinkMatcher));
        extractor.register(Box::new(ParentheticalMatcher));
        extractor.register(Box::new(FootnoteMatcher));
        extractor.register(Box::new(XmlTagMatcher));
        for prefix in &config.volume_prefixes {
            match VolumePathMatcher::new(prefix) {
                Some(matcher) => extractor.register(Box::new(matcher)),
                None => tracing::warn!(prefix = %prefix, "Skipping unusable volume prefix"),
            }
        }
        extractor.register(Box::new(QuotedFileMatcher));

        extractor
    }

    /// Append a matcher after the built-in passes
    pub fn register(&mut self, matcher: Box<dyn CitationMatcher>) {
        self.matchers.push(matcher);
    }

    pub fn matcher_names(&self) -> Vec<&str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Extract citations from `content`, then append any structured sources.
    ///
    /// The first match for a normalized path wins, in pass order; later
    /// duplicates are dropped without merging. Text matches are returned in
    /// the order they appear in `content`, followed by structured sources in
    /// the order given. Ids are `cite-0, cite-1, ...` over the final list.
    pub fn extract(
        &self,
        content: &str,
        structured_sources: Option<&[StructuredSource]>,
    ) -> Vec<Citation> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut found: Vec<(usize, Citation)> = vec![];

        if !content.is_empty() {
            for matcher in &self.matchers {
                for candidate in matcher.find(content) {
                    let path = normalize_path(&candidate.path);
                    if path.is_empty() || !seen.insert(path.clone()) {
                        continue;
                    }
                    debug!(matcher = matcher.name(), path = %path, "Citation match");

                    let page = candidate.page.or_else(|| infer_page(&candidate.anchor));
                    let label = candidate
                        .label
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| l.trim().to_string())
                        .unwrap_or_else(|| label_for(&path));
                    let snippet = snippet_around(content, &candidate.span, self.snippet_radius);

                    found.push((
                        candidate.span.start,
                        Citation {
                            id: String::new(),
                            label,
                            file_type: FileType::from_path(&path),
                            path,
                            page,
                            chunk: None,
                            score: None,
                            snippet: Some(snippet).filter(|s| !s.is_empty()),
                            ref_number: candidate.ref_number,
                        },
                    ));
                }
            }
        }

        // Stable: equal offsets keep pass order
        found.sort_by_key(|(offset, _)| *offset);
        let mut citations: Vec<Citation> = found.into_iter().map(|(_, c)| c).collect();

        for source in structured_sources.unwrap_or_default() {
            let Some(citation) = citation_from_source(source) else {
                continue;
            };
            if seen.insert(citation.path.clone()) {
                citations.push(citation);
            }
        }

        for (index, citation) in citations.iter_mut().enumerate() {
            citation.id = format!("cite-{}", index);
        }
        citations
    }
}

/// Extract citations with the default configuration
pub fn extract_citations(
    content: &str,
    structured_sources: Option<&[StructuredSource]>,
) -> Vec<Citation> {
    CitationExtractor::default().extract(content, structured_sources)
}

fn citation_from_source(source: &StructuredSource) -> Option<Citation> {
    let path = normalize_path(&source.path()?);
    if path.is_empty() {
        return None;
    }
    Some(Citation {
        id: String::new(),
        label: source
            .first_str(StructuredSource::LABEL_KEYS)
            .unwrap_or_else(|| label_for(&path)),
        file_type: FileType::from_path(&path),
        page: source.first_u32(StructuredSource::PAGE_KEYS),
        chunk: source.first_str(StructuredSource::CHUNK_KEYS),
        score: source.first_f64(StructuredSource::SCORE_KEYS),
        snippet: source.first_str(StructuredSource::SNIPPET_KEYS),
        ref_number: source.first_u32(StructuredSource::REF_KEYS),
        path,
    })
}

fn re_page() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:p\.|pg\.?|page)\s*=?\s*(\d+)|#(?:page=)?(\d+)|\[(\d+)\]")
            .expect("re_page: pattern is valid and should always compile")
    })
}

/// Fallback page scan over anchor text: `p.N`, `page N`, `#N`, `[N]`
pub fn infer_page(anchor: &str) -> Option<u32> {
    re_page().captures_iter(anchor).find_map(|caps| {
        (1..=3)
            .filter_map(|i| caps.get(i))
            .find_map(|m| m.as_str().parse::<u32>().ok())
            .filter(|page| *page >= 1)
    })
}

/// Up to `radius` characters either side of `span`, whitespace-collapsed
pub fn snippet_around(content: &str, span: &Range<usize>, radius: usize) -> String {
    let start = content[..span.start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(span.start);
    let end = content[span.end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| span.end + i)
        .unwrap_or(content.len());
    content[start..end]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every citation seen across a conversation, merged by path.
/// First occurrence wins; ids are left as the producing message assigned them.
#[derive(Debug, Clone, Default)]
pub struct ConversationCitations {
    citations: Vec<Citation>,
    paths: HashSet<String>,
}

impl ConversationCitations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one message's citations; returns how many were new
    pub fn merge(&mut self, incoming: &[Citation]) -> usize {
        let before = self.citations.len();
        for citation in incoming {
            if self.paths.insert(normalize_path(&citation.path)) {
                self.citations.push(citation.clone());
            }
        }
        self.citations.len() - before
    }

    pub fn get(&self, path: &str) -> Option<&Citation> {
        let key = normalize_path(path);
        self.citations.iter().find(|c| c.path == key)
    }

    pub fn all(&self) -> &[Citation] {
        &self.citations
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources(values: Vec<Value>) -> Vec<StructuredSource> {
        values.into_iter().map(StructuredSource::from).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_citations("", None).is_empty());
        assert!(extract_citations("nothing to see here", None).is_empty());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let text = "See (Source: /Volumes/main/r.pdf, page 3) and [Also](b.csv)";
        let citations = extract_citations(text, None);

        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].id, "cite-0");
        assert_eq!(citations[0].path, "/Volumes/main/r.pdf");
        assert_eq!(citations[0].page, Some(3));
        assert_eq!(citations[0].file_type, FileType::Pdf);
        assert_eq!(citations[0].label, "r.pdf");
        assert_eq!(citations[1].id, "cite-1");
        assert_eq!(citations[1].path, "b.csv");
        assert_eq!(citations[1].file_type, FileType::Data);
        assert_eq!(citations[1].label, "Also");
    }

    #[test]
    fn test_same_path_two_conventions_first_pass_wins() {
        // The quoted form appears earlier in the text, but the markdown pass runs first
        let text = r#"Open "docs/plan.pdf" or read [The Plan, p. 7](docs/plan.pdf)."#;
        let citations = extract_citations(text, None);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].label, "The Plan, p. 7");
        assert_eq!(citations[0].page, Some(7));
    }

    #[test]
    fn test_one_citation_per_file_across_passes() {
        let citations = extract_citations("(Source: /Volumes/a/r.pdf p. 3)", None);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].path, "/Volumes/a/r.pdf");
        assert_eq!(citations[0].page, Some(3));
        assert_eq!(citations[0].file_type, FileType::Pdf);

        let citations = extract_citations("[doc](https://x.com/Volumes/a.pdf)", None);
        let paths: Vec<&str> = citations.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["https://x.com/Volumes/a.pdf"]);
    }

    #[test]
    fn test_directory_names_are_not_pages() {
        let citations = extract_citations("(Source: /Volumes/main/page1/r.pdf)", None);
        assert_eq!(citations[0].page, None);

        let citations = extract_citations("Raw data: /Volumes/main/p.12/r.csv", None);
        assert_eq!(citations[0].path, "/Volumes/main/p.12/r.csv");
        assert_eq!(citations[0].page, None);

        let citations = extract_citations(r#"<source path="docs/page7/x.pdf"/>"#, None);
        assert_eq!(citations[0].page, None);
    }

    #[test]
    fn test_malformed_parenthetical_contributes_nothing() {
        assert!(extract_citations("Growth was strong (See: Q1/Q2 results) overall.", None).is_empty());
    }

    #[test]
    fn test_dedup_uses_normalized_path() {
        let text = "[a](/Volumes//x/a.pdf) and [b](/Volumes/x/a.pdf)";
        let citations = extract_citations(text, None);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].path, "/Volumes/x/a.pdf");
        assert_eq!(citations[0].label, "a");
    }

    #[test]
    fn test_deterministic() {
        let text = "[1] /Volumes/cat/s/v/report.pdf (page 2)\n<source path=\"kb/faq.md\" title=\"FAQ\"/>";
        assert_eq!(extract_citations(text, None), extract_citations(text, None));
    }

    #[test]
    fn test_structured_sources_priority_and_fields() {
        let srcs = sources(vec![
            json!({"file": "", "uri": "s3://bucket/doc.docx", "url": "https://ignored", "pageNumber": 4, "relevance": 0.82, "chunk_id": 17, "excerpt": "revenue grew"}),
            json!({"url": "https://example.com/kb/article", "title": "KB"}),
            json!({"score": 0.5}),
            json!("not an object"),
        ]);
        let citations = extract_citations("", Some(&srcs));

        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].path, "s3://bucket/doc.docx");
        assert_eq!(citations[0].file_type, FileType::Word);
        assert_eq!(citations[0].page, Some(4));
        assert_eq!(citations[0].score, Some(0.82));
        assert_eq!(citations[0].chunk.as_deref(), Some("17"));
        assert_eq!(citations[0].snippet.as_deref(), Some("revenue grew"));
        assert_eq!(citations[1].label, "KB");
        assert_eq!(citations[1].file_type, FileType::Web);
    }

    #[test]
    fn test_structured_source_duplicate_of_text_match_dropped() {
        let srcs = sources(vec![json!({"path": "b.csv", "title": "Other"})]);
        let citations = extract_citations("[Also](b.csv)", Some(&srcs));
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].label, "Also");
    }

    #[test]
    fn test_snippet_radius() {
        let config = CitationConfig {
            snippet_radius: 5,
            ..CitationConfig::default()
        };
        let extractor = CitationExtractor::new(&config);
        let citations = extractor.extract("0123456789 [x](y/z.pdf) abcdefghij", None);
        assert_eq!(citations[0].snippet.as_deref(), Some("6789 [x](y/z.pdf) abcd"));
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let text = "ééééé [doc](a/b.pdf) ü";
        let span = 11..25;
        assert_eq!(&text[span.clone()], "[doc](a/b.pdf)");
        assert_eq!(snippet_around(text, &span, 3), "éé [doc](a/b.pdf) ü");
    }

    #[test]
    fn test_infer_page() {
        assert_eq!(infer_page("Annual report p. 12"), Some(12));
        assert_eq!(infer_page("see page 4"), Some(4));
        assert_eq!(infer_page("#page=9"), Some(9));
        assert_eq!(infer_page("section [2]"), Some(2));
        assert_eq!(infer_page("no pages"), None);
        assert_eq!(infer_page("page 0"), None);
    }

    #[test]
    fn test_matcher_order() {
        let config = CitationConfig {
            volume_prefixes: vec!["/Volumes/".to_string(), "dbfs:/".to_string()],
            ..CitationConfig::default()
        };
        let extractor = CitationExtractor::new(&config);
        assert_eq!(
            extractor.matcher_names(),
            vec![
                "markdown_link",
                "parenthetical",
                "footnote",
                "xml_tag",
                "volume_path",
                "volume_path",
                "quoted_file"
            ]
        );
    }

    #[test]
    fn test_conversation_citations_merge() {
        let mut all = ConversationCitations::new();
        let first = extract_citations("[A](a.pdf) and [B](b.pdf)", None);
        let second = extract_citations("[A again](a.pdf) and [C](c.xlsx)", None);

        assert_eq!(all.merge(&first), 2);
        assert_eq!(all.merge(&second), 1);
        assert_eq!(all.len(), 3);
        assert_eq!(all.get("a.pdf").map(|c| c.label.as_str()), Some("A"));
        assert_eq!(all.get("c.xlsx").map(|c| c.file_type), Some(FileType::Excel));
    }
}
