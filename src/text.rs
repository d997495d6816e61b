//! Small string helpers shared by extraction, chunking and embedding.

/// Length in characters, which is what every budget in this crate counts.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Collapse runs of blanks inside each line and keep at most one empty line
/// between paragraphs.
pub fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_break = false;

    for line in input.lines() {
        let collapsed = collapse_blanks(line);
        if collapsed.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        pending_break = false;
    }

    out
}

fn collapse_blanks(line: &str) -> String {
    let mut buf = String::with_capacity(line.len());
    let mut last_space = false;
    for ch in line.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let input = "  Hello    world \n\n\n\n  second\tline  \nthird";
        assert_eq!(normalize_whitespace(input), "Hello world\n\nsecond line\nthird");
    }

    #[test]
    fn test_normalize_drops_leading_and_trailing_blank_lines() {
        assert_eq!(normalize_whitespace("\n\n  x  \n\n"), "x");
        assert_eq!(normalize_whitespace("   \n \n"), "");
    }

    #[test]
    fn test_char_len_counts_chars() {
        assert_eq!(char_len("héllo"), 5);
    }
}
