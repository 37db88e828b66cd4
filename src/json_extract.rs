//! Bounded JSON recovery from vendor LLM responses.
//!
//! Tiered extraction, used by Outline, Summarize, and Critic: direct parse
//! → fenced ```json block → first-`{`...last-`}` slice → tolerant
//! unescaped-quote repair. Each tier is independently testable.

use serde_json::Value;

/// Extracts the span inside a fenced ```json ... ``` block, if present.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")?;
    let content_start = start + "```json".len();
    let end = text[content_start..].find("```")?;
    Some(text[content_start..content_start + end].trim())
}

/// Extracts the span from the first `{` to the last `}`, inclusive.
pub fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Tolerant unescaped-quote repair: tracks whether we're inside a string
/// value. A `"` only closes the string if followed by optional whitespace
/// then one of `: , } ]`; otherwise it is escaped as literal content. This
/// recovers responses where the model emitted an unescaped `"` inside a
/// string value (e.g. a quoted phrase in narrative prose).
pub fn repair_json_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            out.push(c);
            if c == '"' {
                in_string = true;
            }
            i += 1;
            continue;
        }

        if escaped {
            out.push(c);
            escaped = false;
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                escaped = true;
                i += 1;
            }
            '"' => {
                if closes_string(&chars, i + 1) {
                    out.push(c);
                    in_string = false;
                } else {
                    out.push('\\');
                    out.push('"');
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// True if, starting at `start`, the chars are optional whitespace followed
/// by one of `: , } ]`.
fn closes_string(chars: &[char], start: usize) -> bool {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    matches!(chars.get(i), Some(':') | Some(',') | Some('}') | Some(']')) || i >= chars.len()
}

/// Runs the full tiered recovery: direct parse, then fenced block, then
/// brace span, then whole-content quote repair (each text-extraction tier
/// also retried through quote repair if its own direct parse fails).
pub fn extract_json_object(text: &str) -> Result<Value, String> {
    extract_json_object_reporting(text).map(|(v, _)| v)
}

/// Same recovery ladder as [`extract_json_object`], but also reports whether
/// a tier past direct parsing was needed. Callers log a warning when
/// `recovered` is true, since it means the response was not well-formed JSON
/// on its own (resolved Open Question: visibility over silently masking it).
pub fn extract_json_object_reporting(text: &str) -> Result<(Value, bool), String> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Ok((v, false));
    }

    if let Some(block) = extract_fenced_block(text) {
        if let Ok(v) = serde_json::from_str::<Value>(block) {
            return Ok((v, true));
        }
        let repaired = repair_json_quotes(block);
        if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
            return Ok((v, true));
        }
    }

    if let Some(span) = extract_brace_span(text) {
        if let Ok(v) = serde_json::from_str::<Value>(span) {
            return Ok((v, true));
        }
        let repaired = repair_json_quotes(span);
        if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
            return Ok((v, true));
        }
    }

    let repaired_whole = repair_json_quotes(text);
    if let Ok(v) = serde_json::from_str::<Value>(&repaired_whole) {
        return Ok((v, true));
    }

    Err(format!(
        "could not parse JSON from response (tried direct, fenced block, brace span, and \
         quote-repaired variants); response began with: {}",
        text.chars().take(200).collect::<String>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_parse_succeeds() {
        let v = extract_json_object(r#"{"key": "value"}"#).unwrap();
        assert_eq!(v, json!({"key": "value"}));
    }

    #[test]
    fn fenced_block_is_extracted() {
        let text = "Here you go:\n```json\n{\"key\": \"value\"}\n```\nThanks.";
        let v = extract_json_object(text).unwrap();
        assert_eq!(v, json!({"key": "value"}));
    }

    #[test]
    fn brace_span_is_extracted() {
        let text = r#"Sure, here's the JSON: {"key": "value"} — hope that helps!"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v, json!({"key": "value"}));
    }

    #[test]
    fn quote_repair_recovers_unescaped_inner_quote() {
        let text = r#"{"final_script": "She said "hello" to him."}"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["final_script"], json!("She said \"hello\" to him."));
    }

    #[test]
    fn unparseable_text_fails_with_diagnostic() {
        let err = extract_json_object("not json at all").unwrap_err();
        assert!(err.contains("not json at all"));
    }
}
