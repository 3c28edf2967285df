//! Tolerant parsing of model replies.
//!
//! Generation models are asked for bare JSON but routinely wrap it in
//! markdown fences or pad it with prose. Parsing is a pipeline of pure
//! steps (strip fences → decode → validate keys → fall back), each with an
//! explicit success signal, so a degraded reply degrades the output instead
//! of failing the run.

use serde_json::{Map, Value};

/// Structured fields recovered from an ideation reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub prompt: String,
    pub story: String,
}

/// Parse a model reply into `{prompt, story}`.
///
/// Total: any input yields a reply, and non-empty input yields a non-empty
/// prompt. When the text is not a JSON object with a `prompt` key, the
/// entire input becomes the prompt and the story is empty.
pub fn parse_ai_response(text: &str) -> ParsedReply {
    if let Some(map) = decode_object(text) {
        if let Some(prompt) = map.get("prompt").and_then(Value::as_str) {
            if !prompt.is_empty() {
                let story = map
                    .get("story")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return ParsedReply {
                    prompt: prompt.to_string(),
                    story,
                };
            }
        }
    }

    ParsedReply {
        prompt: text.to_string(),
        story: String::new(),
    }
}

/// Parse a model reply into a JSON object containing every required key.
///
/// Any decode failure, non-object result, or missing key yields `None`,
/// never a partial or substituted result.
pub fn parse_ai_response_generic(text: &str, required_keys: &[&str]) -> Option<Map<String, Value>> {
    let map = decode_object(text)?;
    if required_keys.iter().all(|key| map.contains_key(*key)) {
        Some(map)
    } else {
        None
    }
}

/// Decode the reply (fenced or raw) as a JSON object.
fn decode_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(extract_json(text)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Extract JSON from a response that might have markdown code blocks.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks (without json specifier)
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json() {
        let text = r#"{"prompt": "a cute cat", "story": "once upon a time"}"#;
        let result = parse_ai_response(text);
        assert_eq!(result.prompt, "a cute cat");
        assert_eq!(result.story, "once upon a time");
    }

    #[test]
    fn test_json_in_code_block() {
        let text = "```json\n{\"prompt\": \"a cat in rain\", \"story\": \"rainy day\"}\n```";
        let result = parse_ai_response(text);
        assert_eq!(result.prompt, "a cat in rain");
        assert_eq!(result.story, "rainy day");
    }

    #[test]
    fn test_plain_text_fallback() {
        let text = "just a prompt without json";
        let result = parse_ai_response(text);
        assert_eq!(result.prompt, text);
        assert_eq!(result.story, "");
    }

    #[test]
    fn test_missing_prompt_key_falls_back() {
        let text = r#"{"idea": "something", "story": "other"}"#;
        let result = parse_ai_response(text);
        // Whole input becomes the prompt since there is no "prompt" key.
        assert_eq!(result.prompt, text);
        assert_eq!(result.story, "");
    }

    #[test]
    fn test_empty_prompt_value_falls_back() {
        let text = r#"{"prompt": "", "story": "other"}"#;
        let result = parse_ai_response(text);
        assert_eq!(result.prompt, text);
    }

    #[test]
    fn test_total_on_arbitrary_input() {
        for text in ["", "{", "```", "```json\n{\"prompt\":", "[1, 2, 3]", "null"] {
            let result = parse_ai_response(text);
            if !text.is_empty() {
                assert!(!result.prompt.is_empty());
            }
        }
    }

    #[test]
    fn test_generic_valid() {
        let text = r#"{"idea": "a cat cooking", "story": "chef cat"}"#;
        let result = parse_ai_response_generic(text, &["idea", "story"]).unwrap();
        assert_eq!(result["idea"], "a cat cooking");
    }

    #[test]
    fn test_generic_missing_key() {
        let text = r#"{"idea": "a cat"}"#;
        assert!(parse_ai_response_generic(text, &["idea", "story"]).is_none());
    }

    #[test]
    fn test_generic_invalid_json() {
        assert!(parse_ai_response_generic("not json", &["prompt"]).is_none());
    }

    #[test]
    fn test_generic_non_object() {
        assert!(parse_ai_response_generic("[\"prompt\"]", &["prompt"]).is_none());
    }

    #[test]
    fn test_generic_code_block() {
        let text = "```\n{\"avoid_list\": [\"theme1\"]}\n```";
        let result = parse_ai_response_generic(text, &["avoid_list"]).unwrap();
        assert_eq!(result["avoid_list"], serde_json::json!(["theme1"]));
    }

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"prompt": "x"}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_markdown() {
        let text = "```json\n{\"prompt\": \"x\"}\n```";
        assert_eq!(extract_json(text), r#"{"prompt": "x"}"#);
    }
}
