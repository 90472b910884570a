//! Tolerant JSON extraction from AI output

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("static regex"));
static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("static regex"));

/// Parse the first JSON object found in `text`.
///
/// Tries, in order: the whole text, the body of a markdown fence, then every
/// balanced `{...}` candidate from last to first.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let cleaned = strip_ansi_codes(text);
    let trimmed = cleaned.trim();
    if let Ok(v) = serde_json::from_str::<T>(trimmed) {
        return Ok(v);
    }

    if let Some(body) = FENCE_RE.captures(trimmed).and_then(|c| c.get(1))
        && let Ok(v) = serde_json::from_str::<T>(body.as_str().trim())
    {
        return Ok(v);
    }

    for candidate in extract_json_candidates(trimmed).iter().rev() {
        if let Ok(v) = serde_json::from_str::<T>(candidate) {
            return Ok(v);
        }
    }

    Err(format!(
        "no valid JSON object found in output: {}",
        truncate_chars(trimmed, 300)
    ))
}

/// Convenience wrapper returning an untyped value.
pub fn parse_json_value(text: &str) -> Result<Value, String> {
    parse_json_object::<Value>(text)
}

/// Balanced top-level `{...}` spans, ignoring braces inside strings.
pub fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut depth: u32 = 0;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0
                        && let Some(s) = start.take()
                    {
                        candidates.push(text[s..idx + 1].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    candidates
}

pub fn strip_ansi_codes(input: &str) -> String {
    ANSI_RE.replace_all(input, "").to_string()
}

pub fn truncate_chars(input: &str, max: usize) -> String {
    let mut out = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "Here you go:\n```json\n{\"type\": \"performance\"}\n```\nThanks";
        let v = parse_json_value(text).unwrap();
        assert_eq!(v["type"], "performance");
    }

    #[test]
    fn picks_last_balanced_candidate() {
        let text = "noise {\"a\": 1} more noise {\"b\": \"}\"}";
        let v = parse_json_value(text).unwrap();
        assert_eq!(v["b"], "}");
    }

    #[test]
    fn reports_failure_with_snippet() {
        let err = parse_json_value("definitely not json").unwrap_err();
        assert!(err.contains("definitely not json"));
    }

    #[test]
    fn truncation_marks_cut() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
