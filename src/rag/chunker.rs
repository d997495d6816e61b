use std::sync::OnceLock;

use regex::Regex;

use crate::config::RagConfig;
use crate::text::char_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// A whole labelled section
    Section,
    /// Paragraphs packed out of an oversized section
    ParagraphGroup,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub text: String,
    pub kind: ChunkKind,
    /// In chars
    pub length: usize,
    pub priority: i32,
}

impl Chunk {
    fn new(text: String, kind: ChunkKind) -> Self {
        let length = char_len(&text);
        let priority = score(&text, length);
        Self {
            text,
            kind,
            length,
            priority,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub max_chunks: usize,
    pub min_chunk_len: usize,
    pub section_split_threshold: usize,
    pub target_chunk_len: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

impl From<&RagConfig> for ChunkerConfig {
    fn from(rag: &RagConfig) -> Self {
        Self {
            max_chunks: rag.max_chunks,
            min_chunk_len: rag.min_chunk_len,
            section_split_threshold: rag.section_split_threshold,
            target_chunk_len: rag.target_chunk_len,
        }
    }
}

const HEADING_WEIGHT: i32 = 3;
const LONG_WEIGHT: i32 = 2;
const MEDIUM_WEIGHT: i32 = 1;
const LIST_WEIGHT: i32 = 1;
const BOILERPLATE_PENALTY: i32 = -2;

const LONG_CHUNK: usize = 800;
const MEDIUM_CHUNK: usize = 400;

const BOILERPLATE_KEYWORDS: &[&str] = &[
    "navigation",
    "menu",
    "footer",
    "cookie",
    "subscribe",
    "sign in",
    "log in",
    "copyright",
    "all rights reserved",
    "privacy policy",
];

fn section_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:PAGE (?:TITLE|DESCRIPTION|STRUCTURE|CONTENT):|#{1,3} )")
            .expect("valid section marker regex")
    })
}

fn heading_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:#{1,6} |H[1-6]: |PAGE (?:TITLE|STRUCTURE):)")
            .expect("valid heading regex")
    })
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:\d+[.)]|[-*•])\s+\S").expect("valid list regex")
    })
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"))
}

/// Split a content blob into at most `max_chunks` prioritized chunks.
///
/// Sections (delimited by the extractor's labels and `#` headings) are kept
/// whole when small enough; larger ones are packed paragraph by paragraph up
/// to `target_chunk_len`, never splitting a paragraph. Everything under
/// `min_chunk_len` is dropped. The survivors are ranked by `priority`, ties
/// keeping their position in the page.
pub fn chunk_content(content: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let mut candidates = Vec::new();

    for section in split_sections(content) {
        let len = char_len(section);
        if len < config.min_chunk_len {
            continue;
        }
        if len <= config.section_split_threshold {
            candidates.push(Chunk::new(section.to_string(), ChunkKind::Section));
            continue;
        }
        for group in pack_paragraphs(section, config.target_chunk_len) {
            if char_len(&group) >= config.min_chunk_len {
                candidates.push(Chunk::new(group, ChunkKind::ParagraphGroup));
            }
        }
    }

    // sort_by is stable: equal priorities stay in page order
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates.truncate(config.max_chunks);

    log::debug!(
        "chunked {} chars into {} chunks",
        char_len(content),
        candidates.len()
    );
    candidates
}

/// Trimmed, non-empty sections in page order
fn split_sections(content: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = section_marker()
        .find_iter(content)
        .map(|m| m.start())
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            content[start..end].trim()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Greedy paragraph packing; an oversized paragraph becomes its own group.
fn pack_paragraphs(section: &str, target: usize) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for paragraph in paragraph_break().split(section) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let len = char_len(paragraph);

        if !current.is_empty() && current_len + 2 + len > target {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(paragraph);
        current_len += len;
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// Heuristic relevance pre-filter, not a quality guarantee
fn score(text: &str, length: usize) -> i32 {
    let mut priority = 0;

    if heading_marker().is_match(text) {
        priority += HEADING_WEIGHT;
    }
    if length > LONG_CHUNK {
        priority += LONG_WEIGHT;
    } else if length > MEDIUM_CHUNK {
        priority += MEDIUM_WEIGHT;
    }
    if list_marker().is_match(text) {
        priority += LIST_WEIGHT;
    }

    let lowered = text.to_lowercase();
    if BOILERPLATE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        priority += BOILERPLATE_PENALTY;
    }

    priority
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(word: &str, chars: usize) -> String {
        let unit = format!("{} ", word);
        unit.repeat(chars / unit.len() + 1)[..chars].trim_end().to_string()
    }

    #[test]
    fn test_empty_input_gives_no_chunks() {
        assert!(chunk_content("", &ChunkerConfig::default()).is_empty());
        assert!(chunk_content("   \n\n ", &ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn test_splits_on_labels_and_headings() {
        let blob = format!(
            "PAGE TITLE: Short\n\nPAGE CONTENT:\n# Intro\n{}\n\n## Details\n{}",
            para("alpha", 200),
            para("beta", 300)
        );
        let chunks = chunk_content(&blob, &ChunkerConfig::default());
        // Title section is under the noise floor; the "PAGE CONTENT:" label alone too
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Section));
        assert!(chunks.iter().any(|c| c.text.starts_with("# Intro")));
        assert!(chunks.iter().any(|c| c.text.starts_with("## Details")));
    }

    #[test]
    fn test_large_section_packs_paragraphs() {
        let section = (0..6)
            .map(|i| para(&format!("p{}", i), 500))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_content(&section, &ChunkerConfig::default());

        assert!(chunks.iter().all(|c| c.kind == ChunkKind::ParagraphGroup));
        assert!(chunks.iter().all(|c| c.length <= 1200));
        // 500 + 2 + 500 fits, a third paragraph does not
        assert_eq!(chunks.len(), 3);
        // Paragraphs are never split
        for chunk in &chunks {
            for piece in chunk.text.split("\n\n") {
                assert_eq!(piece.len(), 500);
            }
        }
    }

    #[test]
    fn test_oversized_paragraph_is_kept_whole() {
        let section = format!("{}\n\n{}", para("huge", 2000), para("small", 100));
        let chunks = chunk_content(&section, &ChunkerConfig::default());
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().any(|c| c.length > 1200));
    }

    #[test]
    fn test_cap_and_min_length_hold() {
        let config = ChunkerConfig::default();
        let blob = (0..25)
            .map(|i| format!("## Part {}\n{}", i, para("text", 60 + i * 37)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_content(&blob, &config);
        assert_eq!(chunks.len(), config.max_chunks);
        assert!(chunks.iter().all(|c| c.length >= config.min_chunk_len));
    }

    #[test]
    fn test_priority_ordering_is_stable() {
        let blob = format!(
            "PAGE CONTENT:\n{}\n\n# Heading\n{}\n\n# Other\n{}",
            para("plain", 100),
            para("first", 100),
            para("second", 100)
        );
        let chunks = chunk_content(&blob, &ChunkerConfig::default());
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("# Heading"));
        assert!(chunks[1].text.starts_with("# Other"));
        assert!(chunks[2].text.starts_with("PAGE CONTENT:"));
    }

    #[test]
    fn test_scoring_weights() {
        let plain = para("words", 100);
        assert_eq!(score(&plain, 100), 0);
        assert_eq!(score(&format!("# Title\n{}", plain), 100), HEADING_WEIGHT);
        assert_eq!(score(&plain, 500), MEDIUM_WEIGHT);
        assert_eq!(score(&plain, 900), LONG_WEIGHT);
        assert_eq!(score("Steps:\n1. Open\n2. Close", 20), LIST_WEIGHT);
        assert_eq!(score("- one\n- two", 10), LIST_WEIGHT);
        assert_eq!(score("Footer links and cookie notice", 30), BOILERPLATE_PENALTY);
    }

    #[test]
    fn test_boilerplate_sinks_below_content() {
        let blob = format!(
            "# Menu\nNavigation menu, sign in, subscribe to our newsletter and more links here.\n\n# Article\n{}",
            para("story", 120)
        );
        let chunks = chunk_content(&blob, &ChunkerConfig::default());
        assert!(chunks[0].text.starts_with("# Article"));
        assert!(chunks[1].priority < chunks[0].priority);
    }
}
