//! **Text Chunker** — split an utterance into speakable segments at natural
//! prosodic boundaries, bounded by a maximum segment size.
//!
//! Pure functions, no hidden state. Sanitation first (markup is not speakable),
//! then a left-to-right walk over break offsets. When a span between breaks is
//! longer than the budget, the cut backtracks to whitespace so words are never
//! severed; a hard cut only happens when no whitespace exists in the window.

/// Default maximum chunk size in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 220;

/// Strip structural markup: fenced code blocks, inline code, tags, emphasis
/// markers, link targets, heading markers. Order-sensitive but idempotent.
pub fn sanitize(text: &str) -> String {
    let s = strip_fenced_blocks(text);
    let s = strip_tags(&s);
    let s = strip_links(&s);
    let s = strip_inline_markers(&s);
    strip_heading_markers(&s)
}

/// Split `text` into an ordered list of speakable chunks of at most
/// `max_chunk_size` bytes each (after trimming). Empty and whitespace-only
/// chunks are dropped; an utterance that sanitizes to nothing yields an
/// empty list.
pub fn chunk(text: &str, max_chunk_size: usize) -> Vec<String> {
    let clean = sanitize(text);
    let trimmed = clean.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let max = max_chunk_size.max(1);
    if trimmed.len() <= max {
        return vec![trimmed.to_string()];
    }

    let mut breaks = break_offsets(&clean);
    breaks.push(clean.len());
    breaks.dedup();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    // Last break that still fits in the current chunk.
    let mut last_fitting = 0usize;

    for &b in &breaks {
        if b <= start {
            continue;
        }
        if b - start <= max {
            last_fitting = b;
            continue;
        }
        if last_fitting > start {
            push_chunk(&mut chunks, &clean[start..last_fitting]);
            start = last_fitting;
        }
        // The span up to this break has no fitting natural boundary left;
        // fall back to whitespace-aware size cuts.
        while b - start > max {
            let cut = cut_point(&clean, start, max);
            push_chunk(&mut chunks, &clean[start..cut]);
            start = cut;
        }
        last_fitting = b;
    }

    if start < clean.len() {
        push_chunk(&mut chunks, &clean[start..]);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Byte offsets (exclusive ends) where a chunk may end: sentence ends, clause
/// separators, line breaks, dash asides, parenthetical ends.
fn break_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut iter = text.char_indices().peekable();
    let mut prev: Option<char> = None;
    while let Some((i, c)) = iter.next() {
        let next = iter.peek().map(|&(_, n)| n);
        let end = i + c.len_utf8();
        let is_break = match c {
            '.' | '!' | '?' => next.map_or(true, |n| n.is_whitespace()),
            ',' | ';' | ':' => next.map_or(false, |n| n.is_whitespace()),
            '\n' => true,
            '\u{2014}' | '\u{2013}' => true,
            '-' => {
                prev.map_or(false, |p| p.is_whitespace()) && next.map_or(false, |n| n.is_whitespace())
            }
            ')' => next.map_or(true, |n| n.is_whitespace()),
            _ => false,
        };
        if is_break {
            offsets.push(end);
        }
        prev = Some(c);
    }
    offsets.dedup();
    offsets
}

/// Cut position for the window starting at `start` with budget `max`:
/// the nearest whitespace walking backward from the budget boundary, or a
/// hard cut at the boundary when the window holds a single unbreakable token.
fn cut_point(text: &str, start: usize, max: usize) -> usize {
    let mut limit = start + max;
    if limit >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    let window = &text[start..limit];
    if let Some(pos) = window.rfind(|c: char| c.is_whitespace()) {
        let ws = start + pos;
        if ws > start {
            let ws_len = text[ws..].chars().next().map_or(1, |c| c.len_utf8());
            return ws + ws_len;
        }
    }
    if limit > start {
        limit
    } else {
        // Budget smaller than one character; take one character to progress.
        start + text[start..].chars().next().map_or(1, |c| c.len_utf8())
    }
}

fn strip_fenced_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        out.push_str(&rest[..open]);
        match rest[open + 3..].find("```") {
            Some(close) => {
                out.push(' ');
                rest = &rest[open + 3 + close + 3..];
            }
            None => {
                // Unclosed fence: drop the marker, keep the text.
                rest = &rest[open + 3..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let looks_like_tag = after
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '/');
        if !looks_like_tag {
            out.push_str(&rest[..open + 1]);
            rest = after;
            continue;
        }
        match after.find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[..open + 1]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let candidate = &rest[open..];
        if let Some(label_end) = candidate.find("](") {
            if let Some(url_end) = candidate[label_end + 2..].find(')') {
                out.push_str(&rest[..open]);
                out.push_str(&candidate[1..label_end]);
                rest = &candidate[label_end + 2 + url_end + 1..];
                continue;
            }
        }
        out.push_str(&rest[..open + 1]);
        rest = &rest[open + 1..];
    }
    out.push_str(rest);
    out
}

fn strip_inline_markers(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '`' | '~' | '_'))
        .collect()
}

fn strip_heading_markers(text: &str) -> String {
    text.lines()
        .map(|line| {
            let t = line.trim_start();
            if t.starts_with('#') {
                let stripped = t.trim_start_matches('#');
                if stripped.is_empty() || stripped.starts_with(' ') {
                    return stripped.trim_start();
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk("Hello there, how are you today?", 100);
        assert_eq!(chunks, vec!["Hello there, how are you today?"]);
    }

    #[test]
    fn empty_and_markup_only_yield_nothing() {
        assert!(chunk("", 100).is_empty());
        assert!(chunk("   \n  ", 100).is_empty());
        assert!(chunk("```\nlet x = 1;\n```", 100).is_empty());
    }

    #[test]
    fn splits_at_sentence_boundaries() {
        let text = "First sentence is here. Second sentence follows it. Third one closes.";
        let chunks = chunk(text, 30);
        assert!(chunks.len() >= 3);
        assert!(chunks[0].ends_with('.'));
        for c in &chunks {
            assert!(c.len() <= 30, "chunk too long: {:?}", c);
        }
    }

    #[test]
    fn line_breaks_are_boundaries() {
        let text = "line one\nline two\nline three\nline four\nline five";
        let chunks = chunk(text, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.contains('\n'));
            assert!(c.len() <= 10);
        }
    }

    #[test]
    fn no_punctuation_hard_cuts_without_empty_chunks() {
        let word = "abcde ";
        let text = word.repeat(100); // 600 chars, whitespace but no punctuation
        let chunks = chunk(&text, 100);
        assert!(chunks.len() >= 6);
        for c in &chunks {
            assert!(!c.trim().is_empty());
            assert!(c.len() <= 100);
        }
        assert_eq!(normalize(&chunks.join(" ")), normalize(&text));
    }

    #[test]
    fn single_unbreakable_token_is_hard_cut() {
        let token = "x".repeat(350);
        let chunks = chunk(&token, 100);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().take(3).all(|c| c.len() == 100));
        assert_eq!(chunks[3].len(), 50);
    }

    #[test]
    fn concatenation_reproduces_sanitized_text() {
        let text = "We talked about **grief** today. It comes in waves, doesn't it? \
                    Some days are heavier; others feel almost normal. \
                    [This article](https://example.com/grief) may help — read it slowly.";
        let chunks = chunk(text, 48);
        let rebuilt = normalize(&chunks.join(" "));
        assert_eq!(rebuilt, normalize(&sanitize(text)));
        for c in &chunks {
            assert!(c.len() <= 48, "chunk too long: {:?}", c);
        }
    }

    #[test]
    fn sanitize_strips_markup() {
        let text = "# Heading\nSome *bold* text with `code` and a [link](http://x.y).\n\
                    ```\nfn main() {}\n```\nDone <b>now</b>.";
        let clean = sanitize(text);
        assert!(!clean.contains('#'));
        assert!(!clean.contains('*'));
        assert!(!clean.contains('`'));
        assert!(!clean.contains("http://x.y"));
        assert!(clean.contains("link"));
        assert!(!clean.contains("fn main"));
        assert!(!clean.contains("<b>"));
        assert!(clean.contains("Done now."));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let text = "## Note\nStay *calm* — see [help](http://h) <i>soon</i>.";
        let once = sanitize(text);
        assert_eq!(sanitize(&once), once);
    }
}
