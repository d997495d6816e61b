use crate::extractor::PageContent;
use crate::rag::ScoredChunk;

/// Opens every retrieval-augmented user turn
pub const RAG_MARKER: &str = "[RAG] RELEVANT CONTEXT:";

pub const DEFAULT_USER_TURN: &str =
    "Please summarize this webpage using the content you already have.";

pub const AUTO_SUMMARY_PROMPT: &str = "Summarize this page with a quoted title, bold section headers, and bullet points with one sentence summaries. Keep the format compact with no unnecessary empty lines.";

const OFF_TOPIC_REPLY: &str = "Please only ask questions about the Website.";

pub fn full_system_message(page: &PageContent, language: &str) -> String {
    format!(
        r#"You are MSG, a helpful AI assistant for webpage content.

PAGE INFO:
Title: "{title}"
URL: {url}

CONTENT:
{content}

INSTRUCTIONS:
1. You have ALL the page content above - never ask for more.
2. Never ask for URLs or text - you already have everything.
3. Your task is to understand the content of the webpage and allow user to ask questions about it.
4. You may have access to web search (grounding) capabilities to answer questions that go beyond the content on the page. If you use this, cite your sources.
5. For summaries, follow this EXACT format structure:

   "[Create a short, high-level title summarizing the overall content]"
   Then extract 2-4 major themes from the content. For each:
   **[Descriptive heading for this key theme or section]**
   - [One sentence summary for this key point]
   - [One sentence summary for this key point]

   - Avoid repeating the original article title in the heading. Rephrase it to reflect the purpose, theme, or angle of the content.
   - Focus on core points, not side notes or navigation elements
   - Avoid table of contents, ads, or unrelated page elements
   - For articles/blogs: summarize main arguments and conclusions
   - For recipes: key ingredients and steps
   - For product pages: key features and selling points
6. Never start responses with phrases like "Here is a summary" or "Here's what the page is about".
7. NEVER answer a question that is not related to the content of webpage, if asked reply with "{off_topic}"
8. Maintain context between messages - understand follow-up questions in the context of the previous messages and webpage content.
9. If you use web search (grounding), always cite your sources. You can use footnote style [1] or inline mentions with URLs.
10. {language_line}"#,
        title = page.title,
        url = page.url,
        content = page.raw_text,
        off_topic = OFF_TOPIC_REPLY,
        language_line = language_line(language),
    )
}

/// Page identity and outline only; the content arrives per question.
pub fn minimal_system_message(page: &PageContent, language: &str) -> String {
    let mut info = format!("Title: \"{}\"\nURL: {}\n", page.title, page.url);
    if let Some(description) = page.description.as_deref() {
        info.push_str(&format!("Description: {}\n", description));
    }
    if !page.structural_hints.is_empty() {
        info.push_str("Structure:\n");
        for hint in &page.structural_hints {
            info.push_str(&format!("- {}\n", hint));
        }
    }

    format!(
        r#"You are MSG, a helpful AI assistant for webpage content.

PAGE INFO:
{info}
INSTRUCTIONS:
1. Each question comes with the most relevant sections of this page under "RELEVANT CONTEXT". Answer from those sections.
2. If the sections do not contain the answer, say so briefly instead of guessing.
3. Never ask for URLs or text.
4. NEVER answer a question that is not related to the content of webpage, if asked reply with "{off_topic}"
5. If you use web search (grounding), always cite your sources.
6. {language_line}"#,
        info = info,
        off_topic = OFF_TOPIC_REPLY,
        language_line = language_line(language),
    )
}

/// User turn carrying the retrieved sections in rank order
pub fn rag_message(question: &str, hits: &[ScoredChunk]) -> String {
    let mut out = String::from(RAG_MARKER);
    out.push_str("\n\n");
    for hit in hits {
        out.push_str(&format!(
            "--- Section {} (relevance: {:.2}) ---\n{}\n\n",
            hit.rank, hit.similarity, hit.chunk.text
        ));
    }
    out.push_str("USER QUESTION: ");
    out.push_str(question);
    out
}

pub fn has_rag_context(text: &str) -> bool {
    text.contains("RELEVANT CONTEXT:") || text.contains("[RAG]")
}

fn language_line(code: &str) -> String {
    format!("Always respond in {}.", language_name(code))
}

fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "zh" => "Chinese",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ru" => "Russian",
        other => other,
    }
}
