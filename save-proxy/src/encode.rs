use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Text written to the file: string content verbatim, anything else
/// pretty-printed with two-space indentation.
pub fn content_text(content: &Value) -> Result<String, serde_json::Error> {
    match content {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string_pretty(other),
    }
}

/// Base64 of the UTF-8 text, as the store's write API expects.
pub fn encode_content(content: &Value) -> Result<String, serde_json::Error> {
    content_text(content).map(|text| STANDARD.encode(text.as_bytes()))
}
