//! Best-effort main-content extraction from a rendered page.
//!
//! The strategy walks from most to least specific source and stops as soon
//! as it has something substantial: known content containers, then a copy of
//! the body with boilerplate stripped, then the longest paragraphs, then
//! whatever visible text the page has at all.

pub mod html;

pub use html::HtmlDocument;

use crate::text::{char_len, normalize_whitespace, truncate_chars};

/// Accept a content container outright above this many chars
pub const SUBSTANTIAL_CONTENT: usize = 2000;
/// Below this the longest-paragraphs fallback is tried
pub const SHORT_CONTENT: usize = 500;
/// Below this the whole body text is used
pub const MINIMAL_CONTENT: usize = 200;
/// Sanitized body must beat the container text by this factor
pub const SANITIZED_MARGIN: f64 = 1.2;

const TOP_PARAGRAPHS: usize = 20;
const MIN_PARAGRAPH_LEN: usize = 40;

pub const TRUNCATION_MARKER: &str = "\n\n... (content truncated)";

pub const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
    ".article-content",
    "[role=\"main\"]",
    "[itemprop=\"mainContentOfPage\"]",
];

pub const BOILERPLATE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "nav",
    "header",
    "footer",
    "aside",
    "form",
    ".nav",
    ".navigation",
    ".menu",
    ".header",
    ".footer",
    ".sidebar",
    ".ads",
    ".comments",
    ".social",
    ".share",
    ".related",
    ".recommended",
    "[role=\"banner\"]",
    "[role=\"navigation\"]",
    "[role=\"complementary\"]",
];

/// Read-only view over the live page.
pub trait PageDocument {
    fn url(&self) -> String;
    fn title(&self) -> String;
    fn meta_description(&self) -> Option<String>;
    /// Visible text of the first element matching `selector`
    fn select_first_text(&self, selector: &str) -> Option<String>;
    /// Visible text of every element matching `selector`, in document order
    fn select_texts(&self, selector: &str) -> Vec<String>;
    /// Body text with every subtree matching one of `remove` left out
    fn sanitized_text(&self, remove: &[&str]) -> String;
    fn body_text(&self) -> String;
    /// h1-h3 as (level, text), in document order
    fn headings(&self) -> Vec<(u8, String)>;
}

/// One page view's extracted content. Immutable once captured.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    /// Labelled blob: title, description, structure and main content
    pub raw_text: String,
    pub structural_hints: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Container,
    Sanitized,
    Paragraphs,
    Body,
}

/// Lengths seen while picking a source, for diagnostics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractionReport {
    pub source: ContentSource,
    pub container_len: usize,
    pub sanitized_len: Option<usize>,
    pub paragraphs_len: Option<usize>,
    pub final_len: usize,
    pub truncated: bool,
}

pub fn extract_page(doc: &dyn PageDocument, budget: usize) -> PageContent {
    extract_with_report(doc, budget).0
}

pub fn extract_with_report(
    doc: &dyn PageDocument,
    budget: usize,
) -> (PageContent, ExtractionReport) {
    let title = doc.title().trim().to_string();
    let url = doc.url();
    let description = doc
        .meta_description()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let (main, source, report) = choose_main_content(doc);

    let structural_hints: Vec<String> = doc
        .headings()
        .into_iter()
        .filter_map(|(level, text)| {
            let text = normalize_whitespace(&text).replace('\n', " ");
            (!text.is_empty()).then(|| format!("H{}: {}", level, text))
        })
        .collect();

    let mut blob = String::new();
    if !title.is_empty() {
        blob.push_str(&format!("PAGE TITLE: {}\n\n", title));
    }
    if let Some(ref desc) = description {
        blob.push_str(&format!("PAGE DESCRIPTION: {}\n\n", desc));
    }
    if !structural_hints.is_empty() {
        blob.push_str(&format!("PAGE STRUCTURE:\n{}\n\n", structural_hints.join("\n")));
    }
    blob.push_str(&format!("PAGE CONTENT:\n{}", main));

    let truncated = char_len(&blob) > budget;
    let raw_text = smart_truncate(&blob, budget);

    let report = ExtractionReport {
        source,
        final_len: char_len(&raw_text),
        truncated,
        ..report
    };
    log::debug!(
        "extracted {} chars from {} via {:?} (container {}, sanitized {:?}, paragraphs {:?})",
        report.final_len,
        url,
        report.source,
        report.container_len,
        report.sanitized_len,
        report.paragraphs_len
    );

    (
        PageContent {
            url,
            title,
            raw_text,
            structural_hints,
            description,
        },
        report,
    )
}

fn choose_main_content(doc: &dyn PageDocument) -> (String, ContentSource, ExtractionReport) {
    let mut report = ExtractionReport {
        source: ContentSource::Container,
        container_len: 0,
        sanitized_len: None,
        paragraphs_len: None,
        final_len: 0,
        truncated: false,
    };

    // Longest container wins; ties keep the earlier selector
    let mut content = String::new();
    for selector in MAIN_CONTENT_SELECTORS {
        if let Some(text) = doc.select_first_text(selector) {
            let text = normalize_whitespace(&text);
            if char_len(&text) > char_len(&content) {
                content = text;
            }
        }
    }
    let mut content_len = char_len(&content);
    report.container_len = content_len;
    let mut source = ContentSource::Container;

    if content_len > SUBSTANTIAL_CONTENT {
        return (content, source, report);
    }

    let sanitized = normalize_whitespace(&doc.sanitized_text(BOILERPLATE_SELECTORS));
    let sanitized_len = char_len(&sanitized);
    report.sanitized_len = Some(sanitized_len);
    if sanitized_len as f64 > content_len as f64 * SANITIZED_MARGIN {
        content = sanitized;
        content_len = sanitized_len;
        source = ContentSource::Sanitized;
    }

    if content_len < SHORT_CONTENT {
        let paragraphs = longest_paragraphs(doc);
        let paragraphs_len = char_len(&paragraphs);
        report.paragraphs_len = Some(paragraphs_len);
        if paragraphs_len > content_len {
            content = paragraphs;
            content_len = paragraphs_len;
            source = ContentSource::Paragraphs;
        }
    }

    if content_len < MINIMAL_CONTENT {
        content = normalize_whitespace(&doc.body_text());
        source = ContentSource::Body;
    }

    (content, source, report)
}

fn longest_paragraphs(doc: &dyn PageDocument) -> String {
    let mut paragraphs: Vec<String> = doc
        .select_texts("p")
        .into_iter()
        .map(|p| normalize_whitespace(&p).replace('\n', " "))
        .collect();
    // Stable, so equal lengths keep document order
    paragraphs.sort_by_key(|p| std::cmp::Reverse(char_len(p)));
    paragraphs
        .into_iter()
        .take(TOP_PARAGRAPHS)
        .filter(|p| char_len(p) > MIN_PARAGRAPH_LEN)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Trim `text` to at most `max_chars`, marker included.
///
/// Prefers to end on the last paragraph or sentence boundary that still keeps
/// 80% of the available room; otherwise cuts hard.
pub fn smart_truncate(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }

    let marker_len = char_len(TRUNCATION_MARKER);
    if max_chars <= marker_len {
        return truncate_chars(text, max_chars).to_string();
    }

    let room = max_chars - marker_len;
    let head = truncate_chars(text, room);
    let floor = room * 4 / 5;

    let cut = match last_boundary(head) {
        Some(end) if char_len(&head[..end]) >= floor => &head[..end],
        _ => head,
    };

    format!("{}{}", cut.trim_end(), TRUNCATION_MARKER)
}

/// Byte offset just past the last sentence end or paragraph break in `text`.
fn last_boundary(text: &str) -> Option<usize> {
    let mut boundary = None;
    let mut chars = text.char_indices().peekable();
    let mut prev = '\0';

    while let Some((idx, ch)) = chars.next() {
        let next = chars.peek().map(|(_, c)| *c);
        match ch {
            '.' | '!' | '?' if next.map_or(true, char::is_whitespace) => {
                boundary = Some(idx + ch.len_utf8());
            }
            '\n' if prev == '\n' => boundary = Some(idx),
            _ => {}
        }
        prev = ch;
    }

    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted document: each selector maps to fixed texts
    #[derive(Default)]
    struct FakeDoc {
        containers: Vec<(&'static str, String)>,
        sanitized: String,
        paragraphs: Vec<String>,
        body: String,
        headings: Vec<(u8, String)>,
        description: Option<String>,
    }

    impl PageDocument for FakeDoc {
        fn url(&self) -> String {
            "https://example.com/post".into()
        }
        fn title(&self) -> String {
            "Example Post".into()
        }
        fn meta_description(&self) -> Option<String> {
            self.description.clone()
        }
        fn select_first_text(&self, selector: &str) -> Option<String> {
            self.containers
                .iter()
                .find(|(s, _)| *s == selector)
                .map(|(_, t)| t.clone())
        }
        fn select_texts(&self, selector: &str) -> Vec<String> {
            if selector == "p" {
                self.paragraphs.clone()
            } else {
                vec![]
            }
        }
        fn sanitized_text(&self, _remove: &[&str]) -> String {
            self.sanitized.clone()
        }
        fn body_text(&self) -> String {
            self.body.clone()
        }
        fn headings(&self) -> Vec<(u8, String)> {
            self.headings.clone()
        }
    }

    fn sentence_text(chars: usize) -> String {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        sentence.repeat(chars / sentence.len() + 1)[..chars].to_string()
    }

    #[test]
    fn test_substantial_container_wins_immediately() {
        let doc = FakeDoc {
            containers: vec![("main", "m".repeat(2500)), ("article", "a".repeat(2100))],
            sanitized: "s".repeat(9000),
            ..Default::default()
        };
        let (page, report) = extract_with_report(&doc, 100_000);
        assert_eq!(report.source, ContentSource::Container);
        assert_eq!(report.sanitized_len, None);
        assert!(page.raw_text.contains(&"m".repeat(2500)));
    }

    #[test]
    fn test_sanitized_needs_margin() {
        let doc = FakeDoc {
            containers: vec![("article", "a".repeat(1000))],
            sanitized: "s".repeat(1100),
            ..Default::default()
        };
        let (_, report) = extract_with_report(&doc, 100_000);
        assert_eq!(report.source, ContentSource::Container);

        let doc = FakeDoc {
            containers: vec![("article", "a".repeat(1000))],
            sanitized: "s".repeat(1300),
            ..Default::default()
        };
        let (_, report) = extract_with_report(&doc, 100_000);
        assert_eq!(report.source, ContentSource::Sanitized);
    }

    #[test]
    fn test_short_content_falls_back_to_paragraphs() {
        let long = "word ".repeat(30).trim().to_string();
        let doc = FakeDoc {
            sanitized: "tiny".into(),
            paragraphs: vec!["too short".into(), long.clone(), long.clone(), long.clone()],
            ..Default::default()
        };
        let (page, report) = extract_with_report(&doc, 100_000);
        assert_eq!(report.source, ContentSource::Paragraphs);
        assert!(!page.raw_text.contains("too short"));
        assert_eq!(page.raw_text.matches(&long).count(), 3);
    }

    #[test]
    fn test_nearly_empty_page_uses_body_text() {
        let doc = FakeDoc {
            sanitized: "x".into(),
            body: "Just a login form".into(),
            ..Default::default()
        };
        let (page, report) = extract_with_report(&doc, 100_000);
        assert_eq!(report.source, ContentSource::Body);
        assert!(page.raw_text.ends_with("PAGE CONTENT:\nJust a login form"));
    }

    #[test]
    fn test_blob_carries_metadata_sections() {
        let doc = FakeDoc {
            containers: vec![("main", sentence_text(2500))],
            headings: vec![(1, "Example Post".into()), (2, "  Pricing  ".into()), (3, "".into())],
            description: Some("A post about examples".into()),
            ..Default::default()
        };
        let page = extract_page(&doc, 100_000);
        assert!(page
            .raw_text
            .starts_with("PAGE TITLE: Example Post\n\nPAGE DESCRIPTION: A post about examples"));
        assert!(page
            .raw_text
            .contains("PAGE STRUCTURE:\nH1: Example Post\nH2: Pricing\n\nPAGE CONTENT:\n"));
        assert_eq!(page.structural_hints, vec!["H1: Example Post", "H2: Pricing"]);
        assert_eq!(page.description.as_deref(), Some("A post about examples"));
    }

    #[test]
    fn test_truncation_of_long_blob() {
        let blob = sentence_text(20_000);
        let out = smart_truncate(&blob, 12_000);
        assert!(char_len(&out) <= 12_000);
        assert!(out.ends_with(TRUNCATION_MARKER));
        let body = out.trim_end_matches(TRUNCATION_MARKER);
        assert!(body.ends_with('.'));
        assert!(char_len(body) >= (12_000 - char_len(TRUNCATION_MARKER)) * 4 / 5);
    }

    #[test]
    fn test_truncation_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(900), "b".repeat(500));
        let out = smart_truncate(&text, 1000);
        assert_eq!(out, format!("{}{}", "a".repeat(900), TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation_without_boundary_cuts_hard() {
        let text = "z".repeat(5000);
        let out = smart_truncate(&text, 1000);
        assert_eq!(char_len(&out), 1000);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_boundary_too_early_is_ignored() {
        let text = format!("Intro. {}", "q".repeat(3000));
        let out = smart_truncate(&text, 1000);
        assert_eq!(char_len(&out), 1000);
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(smart_truncate("short.", 100), "short.");
    }

    #[test]
    fn test_compact_budget_is_respected() {
        let doc = FakeDoc {
            containers: vec![("main", sentence_text(9000))],
            ..Default::default()
        };
        let (page, report) = extract_with_report(&doc, 6000);
        assert!(report.truncated);
        assert!(char_len(&page.raw_text) <= 6000);
    }
}
