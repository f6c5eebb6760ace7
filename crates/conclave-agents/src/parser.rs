use crate::error::AgentError;
use crate::knowledge::Insight;

/// Pull one JSON object out of free-form program output.
///
/// Accepts a bare object, an object inside a fenced code block, or the first
/// balanced `{...}` embedded in other text, in that order of preference.
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();
    let candidates = [
        Some(trimmed.to_string()).filter(|t| t.starts_with('{')),
        fenced_block(trimmed),
        first_balanced_object(trimmed),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
        .ok_or_else(|| {
            AgentError::Parse(format!(
                "no JSON object in output (length={})",
                text.len()
            ))
        })
}

fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip an info string such as `json`.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim().to_string())
}

fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a knowledge response. `{"text": ..., "relevance": ...}` is an
/// insight; an object without `text`, or with an empty one, means the source
/// had nothing to say.
pub fn parse_insight(raw: &str) -> Result<Option<Insight>, AgentError> {
    let json = extract_json(raw)?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    let Some(text) = value.get("text").and_then(|t| t.as_str()) else {
        return Ok(None);
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    let relevance = value
        .get("relevance")
        .and_then(|r| r.as_f64())
        .ok_or_else(|| AgentError::Parse(format!("insight without numeric relevance: {json}")))?;

    Ok(Some(Insight::new(text, relevance)))
}
