// Typed wrapper over AsyncHttpsClient for the embedding and chat endpoints
// (spec §4.5). Both operations return C5's ResponseFuture; the caller
// extracts the field it needs once `run_loop` has fulfilled it.

use serde::Serialize;
use serde_json::Value;

use crate::http::{AsyncHttpsClient, HttpError, Response, ResponseFuture};

/// The source truncates embedding inputs to at most 16,000 characters
/// before sending (spec §4.5).
const MAX_EMBED_CHARS: usize = 16_000;

/// Returned by `extract_chat_message` whenever the response JSON lacks the
/// expected fields (spec §4.5, §7 `ModelResponse`).
pub const CHAT_FALLBACK: &str = "update code";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

pub struct ModelClient {
    host: String,
    api_key: String,
    embedding_model: String,
    chat_model: String,
}

impl ModelClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, embedding_model: impl Into<String>, chat_model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            chat_model: chat_model.into(),
        }
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    /// `embed(text)` posts `{"model": ..., "input": text}` truncated to
    /// 16,000 characters (spec §4.5).
    pub fn embed(&self, http: &mut AsyncHttpsClient, text: &str) -> ResponseFuture {
        let truncated = truncate_chars(text, MAX_EMBED_CHARS);
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": truncated,
        });
        let bytes = serde_json::to_vec(&body).expect("embedding request body always serializes");
        http.post_async(&self.host, "/v1/embeddings", &bytes, &self.auth_headers())
    }

    /// Extract `data[0].embedding` from an embed response. Returns an
    /// empty vector on any network/protocol/model-response failure (spec
    /// §7: Embedding failures degrade to an empty vector).
    pub fn extract_embedding(result: Result<Response, HttpError>) -> Vec<f32> {
        let Ok(response) = result else { return Vec::new() };
        let Ok(value) = serde_json::from_slice::<Value>(&response.body) else { return Vec::new() };
        value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(|e| e.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
            .unwrap_or_default()
    }

    /// `chat(messages, max_tokens, temperature)` posts a messages array
    /// (spec §4.5).
    pub fn chat(&self, http: &mut AsyncHttpsClient, messages: &[ChatMessage], max_tokens: u32, temperature: f32) -> ResponseFuture {
        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let bytes = serde_json::to_vec(&body).expect("chat request body always serializes");
        http.post_async(&self.host, "/v1/chat/completions", &bytes, &self.auth_headers())
    }

    /// Extract `choices[0].message.content`, trimmed of whitespace and
    /// surrounding quotes. Falls back to `CHAT_FALLBACK` on any extraction
    /// failure (spec §4.5, §7).
    pub fn extract_chat_message(result: Result<Response, HttpError>) -> String {
        let Ok(response) = result else { return CHAT_FALLBACK.to_string() };
        let Ok(value) = serde_json::from_slice::<Value>(&response.body) else { return CHAT_FALLBACK.to_string() };
        let Some(content) = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
        else {
            return CHAT_FALLBACK.to_string();
        };
        let trimmed = content.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);
        if unquoted.is_empty() {
            CHAT_FALLBACK.to_string()
        } else {
            unquoted.to_string()
        }
    }

    /// The fixed commit-message prompt (spec §4.5): a system message asking
    /// for a short commit message with an optional conventional-commit
    /// prefix, returning only the message, and a user message carrying the
    /// formatted diff context.
    pub fn commit_message_prompt(diff_context: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "Generate a short git commit message for the following change. \
                 A conventional-commit prefix (feat:, fix:, refactor:, ...) is \
                 optional. Reply with only the commit message, no commentary.",
            ),
            ChatMessage::user(diff_context),
        ]
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RequestState;

    #[test]
    fn extracts_embedding_from_well_formed_response() {
        let body = serde_json::json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]});
        let response = Response { status: 200, headers: Default::default(), body: serde_json::to_vec(&body).unwrap() };
        let v = ModelClient::extract_embedding(Ok(response));
        assert_eq!(v, vec![0.1f32, 0.2, 0.3]);
    }

    #[test]
    fn missing_embedding_field_yields_empty_vector() {
        let body = serde_json::json!({"data": []});
        let response = Response { status: 200, headers: Default::default(), body: serde_json::to_vec(&body).unwrap() };
        assert!(ModelClient::extract_embedding(Ok(response)).is_empty());
    }

    #[test]
    fn network_failure_yields_empty_vector() {
        let err = HttpError { state: RequestState::Connecting, detail: "boom".into() };
        assert!(ModelClient::extract_embedding(Err(err)).is_empty());
    }

    #[test]
    fn extracts_and_unquotes_chat_message() {
        let body = serde_json::json!({"choices": [{"message": {"content": "\"fix: handle edge case\""}}]});
        let response = Response { status: 200, headers: Default::default(), body: serde_json::to_vec(&body).unwrap() };
        assert_eq!(ModelClient::extract_chat_message(Ok(response)), "fix: handle edge case");
    }

    #[test]
    fn chat_falls_back_on_missing_field() {
        let body = serde_json::json!({"choices": []});
        let response = Response { status: 200, headers: Default::default(), body: serde_json::to_vec(&body).unwrap() };
        assert_eq!(ModelClient::extract_chat_message(Ok(response)), CHAT_FALLBACK);
    }

    #[test]
    fn embed_input_is_truncated() {
        let long = "x".repeat(MAX_EMBED_CHARS + 500);
        assert_eq!(truncate_chars(&long, MAX_EMBED_CHARS).chars().count(), MAX_EMBED_CHARS);
    }
}
