use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BotConfig;
use crate::http_client::build_http_client;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What the provider answered, decoded once at the call boundary.
///
/// Transport problems (network, timeout, non-2xx without an error payload, a body
/// that is not JSON) are reported as `Err` by [`ChatModel::chat`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Success(String),
    ProviderError(String),
    Malformed,
}

/// The remote text-generation capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: Vec<Message>, temperature: f32) -> Result<ChatOutcome>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: String,
    model: String,
    http_referer: String,
    app_title: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            api_url,
            api_key,
            model,
            http_referer: String::new(),
            app_title: String::new(),
            max_tokens: 512,
            client,
        }
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.request_timeout_secs.max(1)))?;
        let mut llm = Self::new(
            config.llm_api_url.trim_end_matches('/').to_string(),
            config.llm_api_key.clone().unwrap_or_default(),
            config.llm_model.clone(),
            client,
        );
        llm.http_referer = config.http_referer.clone();
        llm.app_title = config.app_title.clone();
        llm.max_tokens = config.max_tokens;
        Ok(llm)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, messages: Vec<Message>, temperature: f32) -> Result<ChatOutcome> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: Some(self.max_tokens),
        };

        let mut req = self.client.post(&url).json(&request);

        // Add API key header if provided (not needed for local models)
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        if !self.http_referer.is_empty() {
            req = req.header("HTTP-Referer", self.http_referer.as_str());
        }
        if !self.app_title.is_empty() {
            req = req.header("X-Title", self.app_title.as_str());
        }

        let response = req.send().await.context("Failed to send LLM request")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read LLM response body")?;
        tracing::debug!("LLM response ({}): {}", status, body);

        let parsed = serde_json::from_str::<Value>(&body);
        if !status.is_success() {
            // Providers usually explain a rejection in an error object; keep that message.
            if let Ok(value) = &parsed {
                if let Some(message) = provider_error_message(value) {
                    return Ok(ChatOutcome::ProviderError(message));
                }
            }
            anyhow::bail!("LLM API returned error {}: {}", status, body);
        }

        let value = parsed.context("Failed to parse LLM response")?;
        Ok(decode_completion(&value))
    }
}

/// Decode a chat-completions body. An error object wins over any content, then
/// `choices[0].message.content`, then `choices[0].text`.
pub fn decode_completion(value: &Value) -> ChatOutcome {
    if let Some(message) = provider_error_message(value) {
        return ChatOutcome::ProviderError(message);
    }

    let choice = value.get("choices").and_then(|choices| choices.get(0));
    let content = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty());
    let text = choice
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty());

    match content.or(text) {
        Some(text) => ChatOutcome::Success(text.to_string()),
        None => ChatOutcome::Malformed,
    }
}

fn provider_error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }
    let message = match error {
        Value::String(message) => message.clone(),
        _ => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    };
    Some(message)
}

/// Parse a JSON payload out of model output that may be wrapped in a `<think>`
/// preamble, a markdown code fence, or surrounding prose.
pub fn parse_json<T>(response: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if let Ok(parsed) = serde_json::from_str::<T>(response) {
        return Ok(parsed);
    }

    let cleaned = if let Some(think_end) = response.rfind("</think>") {
        &response[think_end + 8..]
    } else {
        response
    };

    if let Ok(parsed) = serde_json::from_str::<T>(cleaned.trim()) {
        return Ok(parsed);
    }

    let json_content = if let Some(start) = cleaned.find("```json") {
        let after_start = &cleaned[start + 7..];
        if let Some(end) = after_start.find("```") {
            after_start[..end].trim()
        } else {
            cleaned
        }
    } else if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}').filter(|end| *end >= start) {
            &cleaned[start..=end]
        } else {
            cleaned
        }
    } else {
        cleaned
    };

    serde_json::from_str::<T>(json_content.trim()).context(format!(
        "Failed to parse JSON. Extracted: {} | Original: {}",
        json_content,
        response.chars().take(500).collect::<String>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_provider(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(api_url: String, timeout_secs: u64) -> LlmClient {
        let config = BotConfig {
            llm_api_url: api_url,
            llm_api_key: Some("sk-or-test".to_string()),
            http_referer: "http://stan.test".to_string(),
            app_title: "stan-tests".to_string(),
            request_timeout_secs: timeout_secs,
            ..BotConfig::default()
        };
        LlmClient::from_config(&config).unwrap()
    }

    fn header(headers: &HeaderMap, name: &str) -> String {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn chat_sends_attribution_headers_and_request_body() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let echoed = format!(
                    "{}|{}|{}|{}|{}",
                    header(&headers, "authorization"),
                    header(&headers, "http-referer"),
                    header(&headers, "x-title"),
                    body["model"].as_str().unwrap_or_default(),
                    body["messages"][0]["role"].as_str().unwrap_or_default(),
                );
                Json(json!({ "choices": [{ "message": { "content": echoed } }] }))
            }),
        );
        let client = client_for(spawn_provider(app).await, 5);

        let outcome = client.chat(vec![Message::system("be nice")], 0.0).await.unwrap();
        assert_eq!(
            outcome,
            ChatOutcome::Success(
                "Bearer sk-or-test|http://stan.test|stan-tests|openai/gpt-4o-mini|system"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn rejection_with_error_object_is_a_provider_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::PAYMENT_REQUIRED,
                    Json(json!({ "error": { "message": "Insufficient credits", "code": 402 } })),
                )
            }),
        );
        let client = client_for(spawn_provider(app).await, 5);

        let outcome = client.chat(vec![Message::user("hi")], 0.7).await.unwrap();
        assert_eq!(
            outcome,
            ChatOutcome::ProviderError("Insufficient credits".to_string())
        );
    }

    #[tokio::test]
    async fn rejection_without_error_object_is_a_transport_failure() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(spawn_provider(app).await, 5);

        let error = client.chat(vec![Message::user("hi")], 0.7).await.unwrap_err();
        let error = format!("{:#}", error);
        assert!(error.contains("502"));
        assert!(error.contains("upstream down"));
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_transport_failure() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { "<html>maintenance</html>" }),
        );
        let client = client_for(spawn_provider(app).await, 5);

        let error = client.chat(vec![Message::user("hi")], 0.7).await.unwrap_err();
        assert!(format!("{:#}", error).contains("Failed to parse LLM response"));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "choices": [{ "message": { "content": "too late" } }] }))
            }),
        );
        let client = client_for(spawn_provider(app).await, 1);

        assert!(client.chat(vec![Message::user("hi")], 0.7).await.is_err());
    }

    #[test]
    fn decode_prefers_message_content() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi there" }, "text": "ignored" }]
        });
        assert_eq!(
            decode_completion(&body),
            ChatOutcome::Success("Hi there".to_string())
        );
    }

    #[test]
    fn decode_falls_back_to_text_field() {
        let body = json!({ "choices": [{ "text": "plain completion" }] });
        assert_eq!(
            decode_completion(&body),
            ChatOutcome::Success("plain completion".to_string())
        );

        let body = json!({ "choices": [{ "message": { "content": "" }, "text": "from text" }] });
        assert_eq!(
            decode_completion(&body),
            ChatOutcome::Success("from text".to_string())
        );
    }

    #[test]
    fn decode_surfaces_provider_error_over_content() {
        let body = json!({
            "error": { "message": "Rate limit exceeded", "code": 429 },
            "choices": [{ "message": { "content": "stale" } }]
        });
        assert_eq!(
            decode_completion(&body),
            ChatOutcome::ProviderError("Rate limit exceeded".to_string())
        );

        let body = json!({ "error": "model not found" });
        assert_eq!(
            decode_completion(&body),
            ChatOutcome::ProviderError("model not found".to_string())
        );
    }

    #[test]
    fn decode_reports_malformed_when_nothing_usable() {
        assert_eq!(decode_completion(&json!({})), ChatOutcome::Malformed);
        assert_eq!(
            decode_completion(&json!({ "choices": [] })),
            ChatOutcome::Malformed
        );
        assert_eq!(
            decode_completion(&json!({ "error": null, "choices": [{ "message": {} }] })),
            ChatOutcome::Malformed
        );
    }

    #[test]
    fn parse_json_handles_fences_and_think_blocks() {
        let fenced = "Sure!\n```json\n{\"name\": \"Kia\"}\n```";
        let value: Value = parse_json(fenced).unwrap();
        assert_eq!(value["name"], "Kia");

        let thinking = "<think>the user said their pet</think>\n{\"pet\": \"cat\"}";
        let value: Value = parse_json(thinking).unwrap();
        assert_eq!(value["pet"], "cat");

        let prose = "Here you go: {\"hobby\": \"chess\"} hope that helps";
        let value: Value = parse_json(prose).unwrap();
        assert_eq!(value["hobby"], "chess");
    }

    #[test]
    fn parse_json_rejects_garbage() {
        assert!(parse_json::<Value>("no json here").is_err());
        assert!(parse_json::<Value>("} backwards {").is_err());
    }
}
