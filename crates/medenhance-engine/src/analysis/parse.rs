use serde_json::{Deserializer, Value};

pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !(raw.starts_with("```") && raw.ends_with("```")) {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        return raw.to_string();
    }
    let mut body = lines[1..lines.len() - 1].join("\n").trim().to_string();
    if body.to_ascii_lowercase().starts_with("json") {
        body = body[4..].trim().to_string();
    }
    body
}

/// First well-formed JSON object, or non-empty array of objects or strings,
/// embedded in free text.
///
/// Every `{` / `[` is tried as the start of a value and trailing text is
/// ignored. Bracketed prose such as citations (`[1]`) is skipped.
pub fn extract_embedded_json(text: &str) -> Option<Value> {
    let raw = strip_code_fence(text);
    if raw.is_empty() {
        return None;
    }
    raw.char_indices()
        .filter(|(_, ch)| *ch == '{' || *ch == '[')
        .find_map(|(idx, _)| parse_leading_value(&raw[idx..]))
}

fn parse_leading_value(text: &str) -> Option<Value> {
    let mut stream = Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value @ Value::Object(_))) => Some(value),
        Some(Ok(Value::Array(rows))) if is_structured_rows(&rows) => Some(Value::Array(rows)),
        _ => None,
    }
}

fn is_structured_rows(rows: &[Value]) -> bool {
    !rows.is_empty()
        && rows
            .iter()
            .all(|row| matches!(row, Value::Object(_) | Value::String(_)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_embedded_json, strip_code_fence};

    #[test]
    fn strip_code_fence_removes_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[test]
    fn finds_object_after_prose() {
        let text = "Quality looks fine [see note].\n\n\
            {\"quality_score\": 84, \"recommendations\": [\"denoise\"]}\nThanks.";
        assert_eq!(
            extract_embedded_json(text),
            Some(json!({"quality_score": 84, "recommendations": ["denoise"]}))
        );
    }

    #[test]
    fn fenced_array_is_accepted() {
        let text = "```json\n[{\"recommendation\": \"crop\"}]\n```";
        assert_eq!(
            extract_embedded_json(text),
            Some(json!([{"recommendation": "crop"}]))
        );
    }

    #[test]
    fn numeric_citation_does_not_shadow_report_object() {
        let text =
            "Soft tissue contrast is low [1].\n{\"quality_score\": 80, \"recommendations\": []}";
        assert_eq!(
            extract_embedded_json(text),
            Some(json!({"quality_score": 80, "recommendations": []}))
        );
        assert_eq!(
            extract_embedded_json("[\"denoise\", \"crop\"]"),
            Some(json!(["denoise", "crop"]))
        );
    }

    #[test]
    fn citations_alone_are_not_structure() {
        assert_eq!(extract_embedded_json("No JSON here, see reference [2]."), None);
        assert_eq!(extract_embedded_json("Mixed [1, \"a\"] and [[1]]"), None);
    }

    #[test]
    fn plain_prose_has_no_structure() {
        assert_eq!(extract_embedded_json("Score: 85/100. Contrast is adequate."), None);
        assert_eq!(extract_embedded_json("Broken {\"a\": } and []"), None);
        assert_eq!(extract_embedded_json(""), None);
    }
}
