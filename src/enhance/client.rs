//! OpenAI-compatible chat-completions suggestion source

use super::{Suggestion, SuggestionBatch, SuggestionError, SuggestionRequest, SuggestionSource};
use crate::config::EnhancementConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.llm7.io/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano-2025-04-14";

const SYSTEM_PROMPT: &str = "You are an expert QA engineer specializing in API testing. \
Reply with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct SuggestedTests {
    #[serde(alias = "tests", alias = "suggestions")]
    suggested_tests: Vec<Value>,
}

/// Talks to any service speaking the chat-completions protocol
#[derive(Debug, Clone)]
pub struct ChatCompletionsSource {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
}

impl ChatCompletionsSource {
    /// Build from configuration; the API key is read from the configured
    /// environment variable
    pub fn from_config(config: &EnhancementConfig) -> Result<Self, SuggestionError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SuggestionError::Unconfigured(format!("failed to build HTTP client: {}", e)))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl SuggestionSource for ChatCompletionsSource {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionBatch, SuggestionError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": compose_prompt(request) },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut call = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call
            .send()
            .await
            .map_err(|e| SuggestionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SuggestionError::Status {
                status,
                body: truncate(&body, 320),
            });
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| SuggestionError::Malformed(e.to_string()))?;
        let choice = body
            .choices
            .first()
            .ok_or_else(|| SuggestionError::Malformed("response did not include choices".into()))?;

        parse_suggestions(&extract_text(&choice.message.content))
    }
}

fn compose_prompt(request: &SuggestionRequest) -> String {
    let parameters =
        serde_json::to_string_pretty(&request.parameters).unwrap_or_else(|_| "[]".to_string());
    let security = if request.admin_only {
        "Required (admin role)"
    } else if request.auth_required {
        "Required"
    } else {
        "None"
    };
    let covered = if request.covered.is_empty() {
        "none".to_string()
    } else {
        request
            .covered
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let existing = request
        .existing_cases
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this API endpoint:\n\
         Endpoint: {method} {path}\n\
         Summary: {summary}\n\
         Parameters: {parameters}\n\
         Security: {security}\n\
         Scenarios already covered by existing tests: {covered}\n\n\
         We already have these basic tests:\n{existing}\n\n\
         Suggest 3-5 CREATIVE edge cases or security tests we might have missed. Focus on:\n\
         - unusual valid inputs (unicode, very long strings, boundary dates)\n\
         - security attacks (SQL injection, XSS, path traversal)\n\
         - business logic violations\n\n\
         Answer with {{\"suggested_tests\": [...]}} where each item has: name, description, \
         scenario (one of happy_path, missing_required_param, below_minimum, above_maximum, \
         wrong_type, unauthorized, forbidden_role, not_found, duplicate_conflict, \
         creative_security), inputs (object keyed by parameter name), expected_status \
         (integer), reasoning.",
        method = request.method,
        path = request.path,
        summary = request.summary,
    )
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Pull the suggestion list out of a reply that may wrap JSON in prose or fences
///
/// Items are read one by one; an unreadable item is counted and skipped.
fn parse_suggestions(text: &str) -> Result<SuggestionBatch, SuggestionError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(SuggestionError::Malformed(format!(
                "no JSON object in reply: {}",
                truncate(text, 120)
            )))
        }
    };
    let parsed: SuggestedTests =
        serde_json::from_str(json).map_err(|e| SuggestionError::Malformed(e.to_string()))?;

    let mut batch = SuggestionBatch::default();
    for (index, item) in parsed.suggested_tests.into_iter().enumerate() {
        match serde_json::from_value::<Suggestion>(item) {
            Ok(suggestion) => batch.suggestions.push(suggestion),
            Err(e) => {
                tracing::warn!(index, error = %e, "unreadable suggestion dropped");
                batch.unreadable += 1;
            }
        }
    }
    Ok(batch)
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::tests::products;
    use std::collections::BTreeSet;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> ChatCompletionsSource {
        let config = EnhancementConfig {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            api_key_env: "GAPGEN_TEST_UNSET_KEY".to_string(),
            ..EnhancementConfig::default()
        };
        ChatCompletionsSource::from_config(&config)
            .unwrap()
            .with_api_key("test-key")
    }

    fn request() -> SuggestionRequest {
        SuggestionRequest::new(&products(), &BTreeSet::new(), &[])
    }

    fn completion(content: &str) -> Value {
        json!({
            "choices": [
                { "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
            ]
        })
    }

    #[tokio::test]
    async fn test_suggestions_from_completion() {
        let server = MockServer::start().await;
        let reply = r#"```json
{"suggested_tests": [
  {"name": "xss in search", "description": "script tag in q", "scenario": "creative_security",
   "inputs": {"page": 1, "q": "<script>alert(1)</script>"}, "expected_status": 200,
   "reasoning": "reflected input"}
]}
```"#;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("test-key"))
            .and(body_partial_json(json!({ "model": DEFAULT_MODEL, "temperature": 0.3 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
            .expect(1)
            .mount(&server)
            .await;

        let batch = source(&server).suggest(&request()).await.unwrap();
        assert_eq!(batch.unreadable, 0);
        assert_eq!(batch.suggestions.len(), 1);
        assert_eq!(batch.suggestions[0].name, "xss in search");
        assert_eq!(batch.suggestions[0].expected_status, 200);
    }

    #[tokio::test]
    async fn test_unreadable_items_do_not_sink_the_batch() {
        let server = MockServer::start().await;
        let reply = json!({
            "suggested_tests": [
                { "name": "quoted status", "scenario": "creative_security", "expected_status": "200" },
                { "name": "no status", "scenario": "happy_path" },
                { "name": "emoji search", "scenario": "creative_security",
                  "inputs": { "page": 1, "q": "\u{1F600}" }, "expected_status": 200 }
            ]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply.to_string())))
            .mount(&server)
            .await;

        let batch = source(&server).suggest(&request()).await.unwrap();
        assert_eq!(batch.unreadable, 2);
        assert_eq!(batch.suggestions.len(), 1);
        assert_eq!(batch.suggestions[0].name, "emoji search");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = source(&server).suggest(&request()).await.unwrap_err();
        match err {
            SuggestionError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("Sorry, I can't help with that.")),
            )
            .mount(&server)
            .await;

        let err = source(&server).suggest(&request()).await.unwrap_err();
        assert!(matches!(err, SuggestionError::Malformed(_)));
    }

    #[test]
    fn test_prompt_mentions_endpoint_and_security() {
        let prompt = compose_prompt(&request());
        assert!(prompt.contains("Endpoint: GET /products"));
        assert!(prompt.contains("Security: None"));
        assert!(prompt.contains("Suggest 3-5 CREATIVE edge cases"));
    }

    #[test]
    fn test_text_from_content_parts() {
        let content = json!([{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }]);
        assert_eq!(extract_text(&content), "a\nb");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
