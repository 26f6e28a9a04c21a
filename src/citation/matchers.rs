//! Built-in citation conventions
//!
//! Each matcher is independent and stateless; dedup and ordering happen in
//! [`CitationExtractor`](super::CitationExtractor).

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::file_type::{looks_like_path, EXTENSION_PATTERN};
use super::{CitationMatcher, MatchCandidate};

fn re_markdown_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\[([^\[\]\n]+)\]\(\s*<?([^()\s<>]+?\.(?:{EXTENSION_PATTERN}))((?:[#?][^()\s<>]*)?)>?\s*\)"
        ))
        .expect("re_markdown_link: pattern is valid and should always compile")
    })
}

fn re_parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\(\s*(?:source|see|reference|ref|from|citation)\s*:\s*([^,()\s]+)\s*(?:,?\s*(?:page|pg\.?|p\.)\s*(\d+))?\s*\)",
        )
        .expect("re_parenthetical: pattern is valid and should always compile")
    })
}

fn re_footnote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[^\w\])])(\^?\[\^?(\d+)\]:?[ \t]+([^\s()]+)(?:[ \t]*\([ \t]*(?i:page|pg\.?|p\.)[ \t]*(\d+)[ \t]*\))?)",
        )
        .expect("re_footnote: pattern is valid and should always compile")
    })
}

fn re_xml_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*(?:source|citation|ref|document)\b([^<>]*?)/?\s*>")
            .expect("re_xml_tag: pattern is valid and should always compile")
    })
}

fn re_xml_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("re_xml_attr: pattern is valid and should always compile")
    })
}

fn re_quoted_file() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r#"(?i)"([^"\n]+?\.(?:{EXTENSION_PATTERN}))""#))
            .expect("re_quoted_file: pattern is valid and should always compile")
    })
}

fn parse_page(caps: &Captures, group: usize) -> Option<u32> {
    caps.get(group)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|page| *page >= 1)
}

/// Sentence punctuation that clings to bare paths
fn trim_trailing_punctuation(path: &str) -> &str {
    path.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

/// `[label](path.ext)`, optionally with a `#page=N` fragment
pub struct MarkdownLinkMatcher;

impl CitationMatcher for MarkdownLinkMatcher {
    fn name(&self) -> &str {
        "markdown_link"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        re_markdown_link()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = caps.get(1)?.as_str();
                let path = caps.get(2)?.as_str();
                let fragment = caps.get(3).map(|m| m.as_str()).unwrap_or("");

                let mut candidate =
                    MatchCandidate::new(path, whole.range(), format!("{} {}", label, fragment));
                candidate.label = Some(label.to_string());
                Some(candidate)
            })
            .collect()
    }
}

/// `(Source: path)`, `(See: path, page N)` and friends
pub struct ParentheticalMatcher;

impl CitationMatcher for ParentheticalMatcher {
    fn name(&self) -> &str {
        "parenthetical"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        re_parenthetical()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path_match = caps.get(1)?;
                let path = path_match.as_str();
                if !looks_like_path(path) {
                    return None;
                }

                let trailer = &text[path_match.end()..whole.end()];
                let mut candidate = MatchCandidate::new(path, whole.range(), trailer);
                candidate.page = parse_page(&caps, 2);
                Some(candidate)
            })
            .collect()
    }
}

/// `[N] path`, `[N]: path (page M)`, `^[N] path`, `[^N]: path`
pub struct FootnoteMatcher;

impl CitationMatcher for FootnoteMatcher {
    fn name(&self) -> &str {
        "footnote"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        re_footnote()
            .captures_iter(text)
            .filter_map(|caps| {
                let reference = caps.get(1)?;
                let path_match = caps.get(3)?;
                let path = trim_trailing_punctuation(path_match.as_str());
                if !looks_like_path(path) {
                    return None;
                }

                // Neither the reference number nor the path is read back as a page
                let trailer = &text[path_match.end()..reference.end()];
                let mut candidate = MatchCandidate::new(path, reference.range(), trailer);
                candidate.ref_number = caps.get(2).and_then(|m| m.as_str().parse().ok());
                candidate.page = parse_page(&caps, 4);
                Some(candidate)
            })
            .collect()
    }
}

/// `<source path="..." page="N" title="..."/>`; also `citation`, `ref` and
/// `document` tags with `file`, `src` or `uri` attributes
pub struct XmlTagMatcher;

impl XmlTagMatcher {
    const PATH_ATTRS: [&'static str; 4] = ["path", "file", "src", "uri"];
}

impl CitationMatcher for XmlTagMatcher {
    fn name(&self) -> &str {
        "xml_tag"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        re_xml_tag()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let attrs: Vec<(String, &str)> = re_xml_attr()
                    .captures_iter(caps.get(1)?.as_str())
                    .filter_map(|a| {
                        let name = a.get(1)?.as_str().to_ascii_lowercase();
                        let value = a.get(2).or_else(|| a.get(3))?.as_str().trim();
                        Some((name, value))
                    })
                    .collect();
                let attr = |name: &str| {
                    attrs
                        .iter()
                        .find(|(n, v)| n == name && !v.is_empty())
                        .map(|(_, v)| *v)
                };

                let path = Self::PATH_ATTRS.iter().find_map(|&name| attr(name))?;
                let title = attr("title").unwrap_or("");
                let mut candidate = MatchCandidate::new(path, whole.range(), title);
                candidate.page = attr("page")
                    .and_then(|p| p.parse::<u32>().ok())
                    .filter(|p| *p >= 1);
                candidate.label = attr("title").map(String::from);
                Some(candidate)
            })
            .collect()
    }
}

/// Bare paths under a known volume prefix, e.g. `/Volumes/main/docs/r.pdf`
pub struct VolumePathMatcher {
    prefix: String,
    regex: Regex,
}

impl VolumePathMatcher {
    pub fn new(prefix: &str) -> Option<Self> {
        if prefix.trim().is_empty() {
            return None;
        }
        let pattern = format!(
            r#"(?i)(?:^|[\s("'\[<>{{}}=,;|*])({}[^\s"'<>()\[\]{{}}|,;]*\.(?:{})\b)((?:#(?:page=)?\d+)?)"#,
            regex::escape(prefix.trim()),
            EXTENSION_PATTERN
        );
        let regex = Regex::new(&pattern).ok()?;
        Some(Self {
            prefix: prefix.trim().to_string(),
            regex,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl CitationMatcher for VolumePathMatcher {
    fn name(&self) -> &str {
        "volume_path"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path = caps.get(1)?;
                let fragment = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                Some(MatchCandidate::new(
                    path.as_str(),
                    path.start()..whole.end(),
                    fragment,
                ))
            })
            .collect()
    }
}

/// `"report.pdf"` or `"docs/report.pdf"`; bare quoted words are ignored
pub struct QuotedFileMatcher;

impl CitationMatcher for QuotedFileMatcher {
    fn name(&self) -> &str {
        "quoted_file"
    }

    fn find(&self, text: &str) -> Vec<MatchCandidate> {
        re_quoted_file()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let path = caps.get(1)?.as_str().trim();
                if !looks_like_path(path) {
                    return None;
                }
                Some(MatchCandidate::new(path, whole.range(), ""))
            })
            .collect()
    }
}
