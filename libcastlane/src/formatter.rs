//! Platform-aware content formatting
//!
//! Pure functions that reshape arbitrary text so it satisfies a platform's
//! character and hashtag constraints. Nothing here fails: every input yields
//! a best-effort string within the platform budget.
//!
//! Pipeline, in order:
//! 1. strip lightweight markdown (`**bold**`, `*italic*`, `_italic_`, `[text](url)`)
//! 2. normalise whitespace (Twitter collapses everything onto one line)
//! 3. drop hashtags beyond the platform maximum, keeping the first ones
//! 4. enforce the length cap, preserving up to three trailing hashtags
//!
//! Lengths are counted in Unicode scalar values.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunker::{byte_offset, ThreadChunker};
use crate::types::{ContentType, Platform};

/// Separator between authored thread segments
pub const THREAD_SEPARATOR: &str = "\n---\n";

/// Characters held back from the budget when hashtags are carried over
const TRUNCATION_BUFFER: usize = 5;

/// Below this many characters of body, hashtag preservation is abandoned
const MIN_BODY_BUDGET: usize = 50;

/// Hashtags carried over when the body is truncated
const PRESERVED_HASHTAGS: usize = 3;

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("valid hashtag pattern"));

static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid link pattern"));

static MD_BOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").expect("valid bold pattern")
});

static MD_ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid italic pattern"));

// Underscore emphasis only at word boundaries so snake_case survives.
static MD_ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").expect("valid italic pattern")
});

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid space pattern"));

/// Format `text` for `platform`.
///
/// Twitter threads are formatted segment by segment (see [`format_thread`])
/// and rejoined with [`THREAD_SEPARATOR`]; every segment then fits the
/// 280-character limit on its own. On other platforms a thread is published
/// as one post with its segments separated by blank lines.
pub fn format(platform: Platform, text: &str, content_type: ContentType) -> String {
    if content_type == ContentType::Thread {
        if platform == Platform::Twitter {
            return format_thread(text).join(THREAD_SEPARATOR);
        }
        let flattened = split_segments(text).join("\n\n");
        return format_single(platform, &flattened);
    }
    format_single(platform, text)
}

/// Format a Twitter thread into numbered, reply-ready segments.
///
/// Authored segments are split on [`THREAD_SEPARATOR`]; any segment still too
/// long is chunked further, and each resulting post gets a ` (i/total)` suffix
/// when there is more than one.
pub fn format_thread(text: &str) -> Vec<String> {
    let limits = Platform::Twitter.limits();
    let cleaned: Vec<String> = split_segments(text)
        .into_iter()
        .map(|segment| {
            let flat = collapse_whitespace(&strip_markdown(segment));
            limit_hashtags(&flat, limits.max_hashtags, true)
        })
        .filter(|segment| !segment.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Vec::new();
    }

    // The numbering width depends on the total, which depends on how much
    // room the numbering leaves. Widen the reservation until it is stable.
    let mut reserve = suffix_len(cleaned.len());
    loop {
        let chunker = ThreadChunker::new(limits.max_length.saturating_sub(reserve));
        let pieces: Vec<String> = cleaned
            .iter()
            .flat_map(|segment| {
                if char_len(segment) + reserve <= limits.max_length {
                    vec![segment.clone()]
                } else {
                    chunker.chunk(segment)
                }
            })
            .collect();

        let needed = if pieces.len() > 1 {
            suffix_len(pieces.len())
        } else {
            0
        };
        if needed <= reserve {
            let total = pieces.len();
            if total == 1 {
                return pieces;
            }
            return pieces
                .into_iter()
                .enumerate()
                .map(|(i, piece)| format!("{} ({}/{})", piece, i + 1, total))
                .collect();
        }
        reserve = needed;
    }
}

fn format_single(platform: Platform, text: &str) -> String {
    let limits = platform.limits();
    let stripped = strip_markdown(text);
    let twitter = platform == Platform::Twitter;

    let normalized = if twitter {
        collapse_whitespace(&stripped)
    } else {
        tidy_spaces(&stripped)
    };

    let capped = limit_hashtags(&normalized, limits.max_hashtags, twitter);
    enforce_length(&capped, limits.practical_length, twitter)
}

/// Remove lightweight markdown, turning `[text](url)` into `text url`.
pub fn strip_markdown(text: &str) -> String {
    let text = MD_LINK.replace_all(text, "$1 $2");
    let text = MD_BOLD.replace_all(&text, "$1$2");
    let text = MD_ITALIC_STAR.replace_all(&text, "$1");
    let text = MD_ITALIC_UNDERSCORE.replace_all(&text, "$1$2$3");
    text.into_owned()
}

/// All hashtag tokens (`#` followed by word characters) in order of appearance
pub fn hashtag_tokens(text: &str) -> Vec<&str> {
    HASHTAG.find_iter(text).map(|m| m.as_str()).collect()
}

/// Number of hashtag tokens in `text`
pub fn count_hashtags(text: &str) -> usize {
    HASHTAG.find_iter(text).count()
}

/// Number of characters (Unicode scalar values) in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Keep the first `max` hashtags and drop the rest.
pub fn limit_hashtags(text: &str, max: usize, single_line: bool) -> String {
    let matches: Vec<_> = HASHTAG.find_iter(text).collect();
    if matches.len() <= max {
        return text.to_string();
    }

    let ranges: Vec<(usize, usize)> = matches[max..].iter().map(|m| (m.start(), m.end())).collect();
    let removed = remove_ranges(text, &ranges);
    if single_line {
        collapse_whitespace(&removed)
    } else {
        tidy_spaces(&removed)
    }
}

/// Enforce `max_length`, carrying up to three trailing hashtags over when the
/// remaining body budget is worth it; otherwise hard-truncate.
pub fn enforce_length(text: &str, max_length: usize, single_line: bool) -> String {
    if char_len(text) <= max_length {
        return text.to_string();
    }

    let matches: Vec<_> = HASHTAG.find_iter(text).collect();
    let kept = &matches[matches.len().saturating_sub(PRESERVED_HASHTAGS)..];
    let trailing = kept.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(" ");
    let reserved = char_len(&trailing) + TRUNCATION_BUFFER;

    if max_length > reserved && max_length - reserved > MIN_BODY_BUDGET {
        let budget = max_length - reserved;
        let ranges: Vec<(usize, usize)> = kept.iter().map(|m| (m.start(), m.end())).collect();
        let body = remove_ranges(text, &ranges);
        let body = if single_line {
            collapse_whitespace(&body)
        } else {
            tidy_spaces(&body)
        };
        let cut = truncate_at_word(&body, budget);

        return match (cut.is_empty(), trailing.is_empty()) {
            (_, true) => cut,
            (true, false) => trailing,
            (false, false) => format!("{} {}", cut, trailing),
        };
    }

    truncate_chars(text, max_length)
}

/// Cut `text` to at most `budget` characters at the last whitespace boundary
/// at or before `budget`; a single unbroken run is hard-cut.
pub fn truncate_at_word(text: &str, budget: usize) -> String {
    if char_len(text) <= budget {
        return text.trim_end().to_string();
    }

    let end = byte_offset(text, budget);
    let prefix = &text[..end];
    let next_is_space = text[end..].chars().next().is_some_and(char::is_whitespace);
    if next_is_space {
        return prefix.trim_end().to_string();
    }

    match prefix.rfind(char::is_whitespace) {
        Some(idx) if !prefix[..idx].trim_end().is_empty() => prefix[..idx].trim_end().to_string(),
        _ => prefix.to_string(),
    }
}

/// First `max_length` characters of `text`
pub fn truncate_chars(text: &str, max_length: usize) -> String {
    text[..byte_offset(text, max_length)].trim_end().to_string()
}

fn split_segments(text: &str) -> Vec<&str> {
    text.split(THREAD_SEPARATOR)
        .flat_map(|part| part.split("\r\n---\r\n"))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of spaces/tabs within lines and trim line ends, keeping line breaks.
fn tidy_spaces(text: &str) -> String {
    text.lines()
        .map(|line| SPACE_RUN.replace_all(line, " ").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn remove_ranges(text: &str, ranges: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in ranges {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn suffix_len(total: usize) -> usize {
    char_len(&format!(" ({}/{})", total, total))
}
