use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a careful health research assistant. \
Output must be valid JSON only and must match the provided schema exactly. \
Do not add explanations or extra fields.";

/// One structured chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
	pub model: &'a str,
	pub prompt: &'a str,
	pub schema_name: &'a str,
	pub schema: &'a Value,
	pub max_tokens: u32,
	pub timeout: Duration,
}

/// Shared HTTP client for chat-completion calls. Connections are pooled across every chain.
#[derive(Debug, Clone)]
pub struct CompletionClient {
	http: Client,
}
impl CompletionClient {
	pub fn new() -> Result<Self> {
		Ok(Self { http: Client::builder().build()? })
	}

	pub async fn complete(
		&self,
		cfg: &biohack_config::LlmProviderConfig,
		request: &CompletionRequest<'_>,
	) -> Result<Value> {
		let url = format!("{}{}", cfg.api_base, cfg.path);
		let body = build_body(cfg.temperature, request);
		let res = self
			.http
			.post(&url)
			.timeout(request.timeout)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let status = res.status();

		if !status.is_success() {
			let text = res.text().await.unwrap_or_default();

			return Err(classify_status(status, text));
		}

		let json: Value = res.json().await?;

		parse_completion_json(json)
	}
}

fn build_body(temperature: f32, request: &CompletionRequest<'_>) -> Value {
	serde_json::json!({
		"model": request.model,
		"temperature": temperature,
		"max_tokens": request.max_tokens,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": request.prompt },
		],
		"response_format": {
			"type": "json_schema",
			"json_schema": {
				"name": request.schema_name,
				"schema": request.schema,
				"strict": true,
			},
		},
	})
}

fn classify_status(status: StatusCode, body: String) -> Error {
	if status == StatusCode::BAD_REQUEST && is_content_filter_body(&body) {
		return Error::ContentPolicy { message: body };
	}

	Error::Status { status: status.as_u16(), body }
}

fn is_content_filter_body(body: &str) -> bool {
	let Ok(json) = serde_json::from_str::<Value>(body) else {
		return body.contains("content_filter");
	};
	let code = json.get("error").and_then(|err| err.get("code")).and_then(Value::as_str);

	matches!(code, Some("content_filter") | Some("ResponsibleAIPolicyViolation"))
}

fn parse_completion_json(json: Value) -> Result<Value> {
	let choice = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing choices.".to_string(),
		})?;

	if choice.get("finish_reason").and_then(Value::as_str) == Some("content_filter") {
		return Err(Error::ContentPolicy {
			message: "Completion was stopped by the content filter.".to_string(),
		});
	}

	let message = choice.get("message").ok_or_else(|| Error::InvalidResponse {
		message: "Completion choice is missing a message.".to_string(),
	})?;

	if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
		return Err(Error::ContentPolicy { message: refusal.to_string() });
	}

	let content = message.get("content").and_then(Value::as_str).ok_or_else(|| {
		Error::InvalidResponse { message: "Completion message is missing content.".to_string() }
	})?;

	Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = serde_json::json!({
			"choices": [
				{ "finish_reason": "stop", "message": { "content": "{\"success\": true}" } }
			]
		});
		let parsed = parse_completion_json(json).expect("parse failed");

		assert_eq!(parsed.get("success"), Some(&Value::Bool(true)));
	}

	#[test]
	fn malformed_content_is_a_serde_error() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "not json" } }]
		});

		assert!(matches!(parse_completion_json(json), Err(Error::SerdeJson(_))));
	}

	#[test]
	fn filtered_finish_reason_is_a_policy_rejection() {
		let json = serde_json::json!({
			"choices": [{ "finish_reason": "content_filter", "message": { "content": null } }]
		});

		assert!(matches!(parse_completion_json(json), Err(Error::ContentPolicy { .. })));
	}

	#[test]
	fn content_filter_status_is_a_policy_rejection() {
		let body = r#"{"error":{"code":"content_filter","message":"filtered"}}"#.to_string();

		assert!(matches!(
			classify_status(StatusCode::BAD_REQUEST, body),
			Error::ContentPolicy { .. }
		));
		assert!(matches!(
			classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
			Error::Status { status: 503, .. }
		));
	}

	#[test]
	fn body_requests_strict_json_schema() {
		let schema = serde_json::json!({ "type": "object" });
		let request = CompletionRequest {
			model: "gpt-4o",
			prompt: "hello",
			schema_name: "pertinence",
			schema: &schema,
			max_tokens: 100,
			timeout: Duration::from_secs(1),
		};
		let body = build_body(0.0, &request);

		assert_eq!(body["response_format"]["json_schema"]["name"], "pertinence");
		assert_eq!(body["response_format"]["json_schema"]["strict"], true);
		assert_eq!(body["messages"][1]["content"], "hello");
		assert_eq!(body["max_tokens"], 100);
	}
}
