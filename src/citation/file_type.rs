//! File-type table, path normalization and label derivation

use serde::{Deserialize, Serialize};

/// Kind of document a citation points at, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Word,
    Excel,
    #[serde(rename = "powerpoint")]
    PowerPoint,
    Text,
    Data,
    Image,
    Web,
    /// Unknown extension
    File,
}

impl FileType {
    /// Map a lowercase extension (no dot) to its file type
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => FileType::Pdf,
            "doc" | "docx" | "odt" | "rtf" => FileType::Word,
            "xls" | "xlsx" | "ods" => FileType::Excel,
            "ppt" | "pptx" | "odp" => FileType::PowerPoint,
            "txt" | "md" | "log" => FileType::Text,
            "csv" | "tsv" | "json" | "xml" | "parquet" | "yaml" | "yml" => FileType::Data,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" => FileType::Image,
            "html" | "htm" => FileType::Web,
            _ => FileType::File,
        }
    }

    /// Classify a citation path. URLs without a known extension are web pages.
    pub fn from_path(path: &str) -> Self {
        let by_ext = extension(path)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(FileType::File);
        if by_ext == FileType::File && is_url(path) {
            FileType::Web
        } else {
            by_ext
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Word => "word",
            FileType::Excel => "excel",
            FileType::PowerPoint => "powerpoint",
            FileType::Text => "text",
            FileType::Data => "data",
            FileType::Image => "image",
            FileType::Web => "web",
            FileType::File => "file",
        }
    }
}

/// Extensions accepted by the text-pattern passes, as a regex alternation
pub(crate) const EXTENSION_PATTERN: &str = "pdf|docx?|odt|rtf|xlsx?|ods|pptx?|odp|txt|md|log|csv|tsv|json|xml|parquet|ya?ml|png|jpe?g|gif|svg|webp|bmp|html?";

/// Lowercase extension of the last path segment, ignoring query and fragment
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Last path segment with any `?query` or `#fragment` removed
pub fn file_name(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed)
}

pub fn is_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Trim whitespace and collapse repeated slashes (a `scheme://` is kept intact)
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let scheme_len = trimmed
        .find("://")
        .filter(|&idx| {
            idx > 0
                && trimmed[..idx]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        })
        .map(|idx| idx + 3)
        .unwrap_or(0);
    let (scheme, rest) = trimmed.split_at(scheme_len);

    let mut out = String::with_capacity(trimmed.len());
    out.push_str(scheme);
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Human-readable label derived from the file name
pub fn label_for(path: &str) -> String {
    let name = file_name(path);
    if name.is_empty() {
        path.to_string()
    } else {
        name.to_string()
    }
}

/// Whether a bare string plausibly names a file: a URL, a path with a
/// separator and a known extension, or a strict `word.ext` shape.
pub fn looks_like_path(candidate: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return false;
    }
    if candidate.contains("://") {
        return !candidate.contains(char::is_whitespace);
    }
    if candidate.contains('/') || candidate.contains('\\') {
        return extension(candidate)
            .is_some_and(|ext| FileType::from_extension(&ext) != FileType::File);
    }
    match candidate.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !ext.is_empty()
                && stem
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}
