// src/llm/json.rs
// Hardened JSON parsing for structured data in LLM output.

use serde::de::DeserializeOwned;

/// Parse JSON from LLM output with fallback strategies.
///
/// Tries in order:
/// 1. Direct parse of trimmed content
/// 2. Strip markdown code fences, then parse
/// 3. Extract first `{...}` or `[...]` block, then parse
///
/// Validation is serde-typed against the caller's schema; when every
/// strategy fails the caller falls back to its empty default rather than
/// attempting to repair the response.
pub fn parse_json_hardened<T: DeserializeOwned>(content: &str) -> Result<T, String> {
    let trimmed = content.trim();

    if let Ok(v) = serde_json::from_str::<T>(trimmed) {
        return Ok(v);
    }

    let stripped = strip_code_fences(trimmed);
    if stripped != trimmed
        && let Ok(v) = serde_json::from_str::<T>(stripped)
    {
        return Ok(v);
    }

    if let Some(extracted) = extract_json_block(trimmed)
        && let Ok(v) = serde_json::from_str::<T>(extracted)
    {
        return Ok(v);
    }

    Err(format!(
        "Failed to parse JSON from LLM output (tried direct, fence-strip, brace-extract). Content start: {}",
        &trimmed[..trimmed.len().min(200)]
    ))
}

/// Strip markdown code fences from a string.
fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();

    if let Some(rest) = trimmed.strip_prefix("```json")
        && let Some(json) = rest.strip_suffix("```")
    {
        return json.trim();
    }
    if let Some(rest) = trimmed.strip_prefix("```")
        && let Some(json) = rest.strip_suffix("```")
    {
        return json.trim();
    }

    trimmed
}

/// Extract the first balanced `{...}` or `[...]` block from a string.
fn extract_json_block(s: &str) -> Option<&str> {
    let (open_char, close_char, start) = {
        let obj = s.find('{');
        let arr = s.find('[');
        match (obj, arr) {
            (Some(o), Some(a)) if o < a => ('{', '}', o),
            (Some(o), None) => ('{', '}', o),
            (_, Some(a)) => ('[', ']', a),
            (None, None) => return None,
        }
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open_char && !in_string => depth += 1,
            c if c == close_char && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Probe {
        value: String,
    }

    #[test]
    fn test_direct_parse() {
        let parsed: Probe = parse_json_hardened(r#"{"value": "x"}"#).expect("parse");
        assert_eq!(parsed.value, "x");
    }

    #[test]
    fn test_fenced_parse() {
        let parsed: Probe =
            parse_json_hardened("```json\n{\"value\": \"x\"}\n```").expect("parse");
        assert_eq!(parsed.value, "x");
    }

    #[test]
    fn test_embedded_block_parse() {
        let parsed: Probe =
            parse_json_hardened("Here is the result: {\"value\": \"x\"} — done.")
                .expect("parse");
        assert_eq!(parsed.value, "x");
    }

    #[test]
    fn test_braces_inside_strings() {
        let parsed: Probe =
            parse_json_hardened(r#"prefix {"value": "a } b"} suffix"#).expect("parse");
        assert_eq!(parsed.value, "a } b");
    }

    #[test]
    fn test_unparseable_is_error() {
        let result: Result<Probe, _> = parse_json_hardened("no json here at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_schema_is_error() {
        let result: Result<Probe, _> = parse_json_hardened(r#"{"other": 1}"#);
        assert!(result.is_err());
    }
}
