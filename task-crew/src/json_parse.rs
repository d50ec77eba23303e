//! Tolerant JSON extraction, the same three-step degrade `task-executor` and
//! `task-planner` use: strip markdown fences, try a direct parse, then fall
//! back to extracting the first balanced `{...}` in the text.

use serde::de::DeserializeOwned;

/// Parse `raw` as a `T`, tolerating markdown fences and surrounding prose.
pub(crate) fn parse_tolerant<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let unfenced = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str(unfenced.trim()) {
        return Some(value);
    }
    let object_slice = extract_first_object(unfenced)?;
    serde_json::from_str(object_slice).ok()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_lang = after_open.trim_start_matches(|c: char| c.is_alphanumeric());
    after_lang.strip_suffix("```").unwrap_or(after_lang).trim()
}

fn extract_first_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
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

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        delegations: Vec<String>,
    }

    #[test]
    fn parses_plain_json() {
        let parsed: Sample = parse_tolerant(r#"{"delegations": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed, Sample { delegations: vec!["a".to_string(), "b".to_string()] });
    }

    #[test]
    fn strips_markdown_fence() {
        let raw = "```json\n{\"delegations\": []}\n```";
        let parsed: Sample = parse_tolerant(raw).unwrap();
        assert_eq!(parsed, Sample { delegations: vec![] });
    }

    #[test]
    fn garbage_returns_none() {
        let parsed: Option<Sample> = parse_tolerant("not json at all");
        assert!(parsed.is_none());
    }
}
