use super::CompletionError;

const FENCE: &str = "```";

/// Fence-line tags models put before tabular or structured payloads.
const LANGUAGE_TAGS: &[&str] = &["csv", "tsv", "json", "text", "txt", "plaintext"];

/// Pull the payload out of the first fenced block of a model response.
///
/// Triple-backtick fences are expected; when none are present, single
/// backticks are treated as fences. A leading language tag (`csv`, `json`)
/// on the opening fence line is dropped. The payload is trimmed.
pub fn extract_delimited(response: &str) -> Result<String, CompletionError> {
    let normalized = if response.contains(FENCE) {
        response.to_string()
    } else {
        response.replace('`', FENCE)
    };
    // Adjacent fences collapse so the block content lands at split index 1.
    let normalized = normalized.replace("```\n```", FENCE);

    let block = normalized.split(FENCE).nth(1).ok_or_else(|| {
        CompletionError::MalformedDelimitedPayload("No delimited block found".into())
    })?;

    let payload = strip_language_tag(block).trim();
    if payload.is_empty() {
        return Err(CompletionError::MalformedDelimitedPayload(
            "Delimited block is empty".into(),
        ));
    }
    Ok(payload.to_string())
}

/// Drop `csv` in "csv\na,b". Any other first line is payload.
fn strip_language_tag(block: &str) -> &str {
    match block.split_once('\n') {
        Some((tag, rest))
            if LANGUAGE_TAGS
                .iter()
                .any(|known| tag.trim().eq_ignore_ascii_case(known)) =>
        {
            rest
        }
        _ => block,
    }
}
