use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use pagechat::chat::CompletionRequest;
use pagechat::config::Config;
use pagechat::embeddings::{EmbeddingClient, EmbeddingService, HashingEmbedding};
use pagechat::error::Result;
use pagechat::extractor::{extract_page, extract_with_report};
use pagechat::rag::{chunk_content, ChunkerConfig, RagIndex};
use pagechat::session::PageSession;
use pagechat::settings::{FileSettingsStore, SettingsStore};
use pagechat::text::truncate_chars;

use super::{embedder, load_document, runtime};

const PREVIEW_CHARS: usize = 160;

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&flat, PREVIEW_CHARS);
    if cut.len() < flat.len() {
        format!("{}...", cut)
    } else {
        flat
    }
}

pub fn cmd_extract(
    config: &Config,
    file: &Path,
    url: Option<&str>,
    compact: bool,
    json: bool,
) -> Result<()> {
    let doc = load_document(file, url)?;
    let budget = if compact {
        config.rag.compact_content_budget
    } else {
        config.rag.full_content_budget
    };
    let (page, report) = extract_with_report(&doc, budget);

    if json {
        let out = serde_json::json!({ "page": page, "report": report });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", "Title:".bold(), page.title);
    println!("{} {}", "URL:".bold(), page.url);
    if let Some(ref description) = page.description {
        println!("{} {}", "Description:".bold(), description);
    }
    println!(
        "{} {:?}, {} chars{}",
        "Source:".bold(),
        report.source,
        report.final_len,
        if report.truncated { " (truncated)" } else { "" }
    );
    for hint in &page.structural_hints {
        println!("  {}", hint.dimmed());
    }
    println!("\n{}", page.raw_text);

    Ok(())
}

pub fn cmd_chunks(config: &Config, file: &Path, url: Option<&str>) -> Result<()> {
    let doc = load_document(file, url)?;
    let page = extract_page(&doc, config.rag.full_content_budget);
    let chunks = chunk_content(&page.raw_text, &ChunkerConfig::from(&config.rag));

    if chunks.is_empty() {
        println!("{}", "No chunks: the page has too little text.".yellow());
        return Ok(());
    }

    println!(
        "{} {} chunks from {}",
        "Chunked".green().bold(),
        chunks.len(),
        page.url
    );
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "\n{} priority {:+}, {:?}, {} chars",
            format!("[{}]", i + 1).cyan().bold(),
            chunk.priority,
            chunk.kind,
            chunk.length
        );
        println!("  {}", preview(&chunk.text));
    }

    Ok(())
}

pub fn cmd_search(
    config: &Config,
    file: &Path,
    query: &str,
    top_k: usize,
    offline: bool,
    url: Option<&str>,
) -> Result<()> {
    let service = embedder(config, offline)?;
    let doc = load_document(file, url)?;
    let page = extract_page(&doc, config.rag.full_content_budget);

    runtime()?.block_on(async {
        let index = RagIndex::new(EmbeddingClient::new(service, &config.rag), &config.rag);
        if let Err(e) = index.initialize(&page).await {
            eprintln!("{} {}", "RAG unavailable:".yellow().bold(), e);
        }

        let hits = index.search(query, top_k).await;
        if hits.is_empty() {
            println!(
                "{}",
                "No chunk above the similarity threshold; a chat would use the full page."
                    .yellow()
            );
            return Ok(());
        }

        for hit in &hits {
            println!(
                "{} relevance {:.2}, priority {:+}",
                format!("#{}", hit.rank).cyan().bold(),
                hit.similarity,
                hit.chunk.priority
            );
            println!("  {}\n", preview(&hit.chunk.text));
        }
        Ok(())
    })
}

pub fn cmd_route(
    config: &Config,
    file: &Path,
    message: &str,
    no_rag: bool,
    offline: bool,
    url: Option<&str>,
) -> Result<()> {
    let service: Arc<dyn EmbeddingService> = if no_rag {
        Arc::new(HashingEmbedding::new(config.rag.embedding_dim))
    } else {
        embedder(config, offline)?
    };
    let store: Arc<dyn SettingsStore> =
        Arc::new(FileSettingsStore::new(config.settings_path.clone()));
    let settings = store.get()?;
    let doc = load_document(file, url)?;

    let mut session = PageSession::new(config.clone(), store, service);
    session.prepare_context(&doc);

    runtime()?.block_on(async {
        if !no_rag {
            if let Err(e) = session.initialize_rag().await {
                eprintln!(
                    "{} {}; using full page context",
                    "RAG unavailable:".yellow().bold(),
                    e
                );
            }
        }

        let routed = session.route(message, &settings.language).await?;
        let request = CompletionRequest::plan(&routed.messages, &settings);

        eprintln!(
            "{} {:?} via {} ({} sections)",
            "Strategy:".bold(),
            routed.strategy,
            request.model,
            routed.hits.len()
        );
        println!("{}", serde_json::to_string_pretty(&request)?);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_cuts() {
        assert_eq!(preview("a\n\nb   c"), "a b c");
        let long = "word ".repeat(100);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }
}
