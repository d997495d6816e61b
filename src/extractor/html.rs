//! `PageDocument` over a static HTML snapshot, built on `scraper`.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use super::PageDocument;

/// Never rendered as visible text
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "svg"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

pub struct HtmlDocument {
    url: String,
    html: Html,
}

impl HtmlDocument {
    pub fn parse(url: impl Into<String>, source: &str) -> Self {
        Self {
            url: url.into(),
            html: Html::parse_document(source),
        }
    }

    fn body(&self) -> ElementRef<'_> {
        selector("body")
            .and_then(|sel| self.html.select(&sel).next())
            .unwrap_or_else(|| self.html.root_element())
    }
}

impl PageDocument for HtmlDocument {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> String {
        self.select_first_text("title").unwrap_or_default()
    }

    fn meta_description(&self) -> Option<String> {
        let sel = selector("meta[name=\"description\"]")?;
        self.html
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    fn select_first_text(&self, css: &str) -> Option<String> {
        let sel = selector(css)?;
        let element = self.html.select(&sel).next()?;
        Some(if css == "title" {
            element.text().collect::<String>()
        } else {
            inner_text(element, &|_| false)
        })
    }

    fn select_texts(&self, css: &str) -> Vec<String> {
        let Some(sel) = selector(css) else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .map(|el| inner_text(el, &|_| false))
            .collect()
    }

    fn sanitized_text(&self, remove: &[&str]) -> String {
        // Bad selectors are skipped, like a querySelectorAll that throws
        let removed: HashSet<_> = remove
            .iter()
            .filter_map(|css| selector(css))
            .flat_map(|sel| self.html.select(&sel).map(|el| el.id()).collect::<Vec<_>>())
            .collect();
        inner_text(self.body(), &|el| removed.contains(&el.id()))
    }

    fn body_text(&self) -> String {
        inner_text(self.body(), &|_| false)
    }

    fn headings(&self) -> Vec<(u8, String)> {
        let Some(sel) = selector("h1, h2, h3") else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .filter_map(|el| {
                let level = heading_level(el.value().name())?;
                let text = collapse_inline(&el.text().collect::<String>());
                Some((level, text))
            })
            .collect()
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Approximates `innerText`: blocks become paragraphs, `<br>` a line break,
/// headings inside the text get a markdown-style `#` prefix.
fn inner_text(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool) -> String {
    let mut out = String::new();
    render(element, skip, &mut out);
    out
}

fn render(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool, out: &mut String) {
    let name = element.value().name();
    if INVISIBLE_TAGS.contains(&name) || skip(&element) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push_str("\n\n");
    }
    if let Some(level) = heading_level(name) {
        out.push_str(&"#".repeat(level as usize));
        out.push(' ');
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&collapse_inline(text));
        } else if let Some(child_el) = ElementRef::wrap(child) {
            render(child_el, skip, out);
        }
    }

    if block {
        out.push_str("\n\n");
    } else if matches!(name, "td" | "th") {
        out.push(' ');
    }
}

/// Source newlines inside a text node are just whitespace
fn collapse_inline(text: &str) -> String {
    let mut buf = String::with_capacity(text.len());
    let mut last_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_space {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}
