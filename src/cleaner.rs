//! `C3` — the Text Cleaner.
//!
//! Deterministic, language-agnostic post-processing of raw LLM text. This is
//! the single source of truth for "user-safe" text: every downstream agent
//! and the final synthesizer only ever see [`clean`]'s output, never raw
//! worker text. `clean` is total — it cannot fail — and idempotent:
//! `clean(clean(x)) == clean(x)` for all `x`.

use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    tagged_blocks: Regex,
    debug_lines: Regex,
    verification_banner_lines: Regex,
    authenticity_block: Regex,
    fenced_json_or_text: Regex,
    excess_newlines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        tagged_blocks: Regex::new(r"(?is)<(think|reasoning|analysis)>.*?</\1>").unwrap(),
        debug_lines: Regex::new(r"(?m)^\[[A-Z]+\].*$\n?").unwrap(),
        verification_banner_lines: Regex::new(
            r"(?m)^(✅ Source:|✅ Agent ID:|✅ A2A Handoff:|✅ Timestamp:).*$\n?",
        )
        .unwrap(),
        authenticity_block: Regex::new(
            r"(?is)🔍 Authentic Agent Output Verification:.*?(\n\s*\n|\z)",
        )
        .unwrap(),
        fenced_json_or_text: Regex::new(r"(?is)```(?:json|text)\s*\n?(.*?)```").unwrap(),
        excess_newlines: Regex::new(r"\n{3,}").unwrap(),
    })
}

/// Remove blocks beginning with one of the self-healing diagnostic markers
/// (`TASK_DECOMPOSITION:`, `Error Context:`, `No specific task was assigned`)
/// up to the next blank line.
fn strip_self_healing_artifacts(text: &str) -> String {
    const MARKERS: [&str; 3] = [
        "TASK_DECOMPOSITION:",
        "Error Context:",
        "No specific task was assigned",
    ];

    let mut out = String::with_capacity(text.len());
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        if MARKERS.iter().any(|m| line.trim_start().starts_with(m)) {
            // Skip through the next blank line (inclusive).
            for skipped in lines.by_ref() {
                if skipped.trim().is_empty() {
                    break;
                }
            }
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Remove fenced ```json``` / ```text``` blocks unless the surrounding text
/// outside the fence is itself essentially empty (i.e. the whole response IS
/// code, in which case the fence is kept).
fn strip_wrapper_fences(text: &str) -> String {
    let p = patterns();
    let non_fenced_len: usize = {
        let mut len = 0usize;
        let mut last = 0usize;
        for m in p.fenced_json_or_text.find_iter(text) {
            len += text[last..m.start()].trim().len();
            last = m.end();
        }
        len += text[last..].trim().len();
        len
    };

    if non_fenced_len == 0 {
        // The whole response is fenced code; keep it verbatim.
        return text.to_string();
    }

    p.fenced_json_or_text.replace_all(text, "").into_owned()
}

fn html_unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

/// Apply every cleaning pass in the order the specification prescribes and
/// return user-safe text. Total and idempotent.
pub fn clean(raw: &str) -> String {
    let p = patterns();

    let mut text = p.tagged_blocks.replace_all(raw, "").into_owned();
    text = strip_wrapper_fences(&text);
    text = strip_self_healing_artifacts(&text);
    text = p.verification_banner_lines.replace_all(&text, "").into_owned();
    text = p.authenticity_block.replace_all(&text, "").into_owned();
    text = p.debug_lines.replace_all(&text, "").into_owned();
    text = p.excess_newlines.replace_all(&text, "\n\n").into_owned();
    text = html_unescape(&text);
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reasoning_tags() {
        let raw = "<think>internal monologue</think>Hello there.";
        assert_eq!(clean(raw), "Hello there.");
    }

    #[test]
    fn strips_analysis_tags_case_insensitive() {
        let raw = "<ANALYSIS>scratch work\nmore scratch</ANALYSIS>Answer: 42";
        assert_eq!(clean(raw), "Answer: 42");
    }

    #[test]
    fn strips_debug_lines() {
        let raw = "[DEBUG] loading model\nActual response here\n[INFO] done";
        assert_eq!(clean(raw), "Actual response here");
    }

    #[test]
    fn strips_verification_banners() {
        let raw = "✅ Source: WeatherAgent\n✅ Timestamp: now\nIt will rain tomorrow.";
        assert_eq!(clean(raw), "It will rain tomorrow.");
    }

    #[test]
    fn strips_self_healing_artifacts() {
        let raw = "TASK_DECOMPOSITION: step1, step2\n\nHere is the real answer.";
        assert_eq!(clean(raw), "Here is the real answer.");
    }

    #[test]
    fn collapses_excess_newlines() {
        let raw = "Line one.\n\n\n\n\nLine two.";
        assert_eq!(clean(raw), "Line one.\n\nLine two.");
    }

    #[test]
    fn html_unescapes() {
        let raw = "Tom &amp; Jerry &lt;3";
        assert_eq!(clean(raw), "Tom & Jerry <3");
    }

    #[test]
    fn keeps_code_fence_when_response_is_entirely_code() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean(raw), raw.trim());
    }

    #[test]
    fn strips_json_fence_when_wrapping_prose() {
        let raw = "Here is the data:\n```json\n{\"a\": 1}\n```\nThanks.";
        let cleaned = clean(raw);
        assert!(!cleaned.contains("```"));
        assert!(cleaned.contains("Here is the data"));
        assert!(cleaned.contains("Thanks."));
    }

    #[test]
    fn is_idempotent() {
        let raw = "<think>x</think>[DEBUG] y\n\n\n\nFinal answer &amp; done.";
        let once = clean(raw);
        let twice = clean(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn is_idempotent_on_plain_text() {
        let raw = "Just a plain, unremarkable response.";
        assert_eq!(clean(raw), clean(&clean(raw)));
    }
}
