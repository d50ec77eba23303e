//! Tolerant JSON extraction from raw model output.
//!
//! Models wrap JSON in prose and markdown fences more often than not. This
//! tries, in order: strip ```json fences, parse the whole trimmed string,
//! then fall back to regex-extracting the first balanced-looking `{...}`
//! block and parsing that.

use serde::de::DeserializeOwned;

/// Parse `raw` as a `T`, tolerating markdown fences and surrounding prose.
pub fn parse_tolerant<T: DeserializeOwned>(raw: &str) -> Option<T> {
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

/// Find the first `{...}` block with balanced braces, ignoring braces that
/// appear inside string literals.
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
