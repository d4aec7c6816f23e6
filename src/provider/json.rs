// src/provider/json.rs — Pull structured JSON out of model responses

use serde::de::DeserializeOwned;

/// Locate the JSON document inside a model response.
///
/// Handles bare JSON, ```json fenced blocks, and prose before/after the
/// outermost object or array.
pub fn extract_json(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    let open = trimmed.find(['{', '['])?;
    let close_char = if trimmed[open..].starts_with('{') {
        '}'
    } else {
        ']'
    };
    let close = trimmed.rfind(close_char)?;
    (close > open).then(|| &trimmed[open..=close])
}

/// Parse a typed value from a model response, rejecting on shape mismatch.
pub fn parse_model_json<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let json = extract_json(content).ok_or_else(|| anyhow::anyhow!("response contained no JSON"))?;
    serde_json::from_str(json).map_err(|e| anyhow::anyhow!("malformed JSON response: {e}"))
}
