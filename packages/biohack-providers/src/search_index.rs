use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Hybrid keyword and vector search against an Azure AI Search compatible index.
#[derive(Debug, Clone)]
pub struct SearchIndexClient {
	http: Client,
}
impl SearchIndexClient {
	pub fn new() -> Result<Self> {
		Ok(Self { http: Client::builder().build()? })
	}

	/// Returns raw hits, most relevant first.
	pub async fn search(
		&self,
		cfg: &biohack_config::SearchProviderConfig,
		query: &str,
		limit: u32,
	) -> Result<Vec<Value>> {
		let url = format!("{}{}", cfg.api_base, cfg.path);
		let body = build_search_body(query, limit, &cfg.vector_fields, cfg.k_nearest);
		let res = self
			.http
			.post(url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.headers(crate::api_key_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let status = res.status();

		if !status.is_success() {
			let body = res.text().await.unwrap_or_default();

			return Err(Error::Status { status: status.as_u16(), body });
		}

		let json: Value = res.json().await?;
		let hits = parse_search_response(json)?;

		tracing::debug!(provider_id = %cfg.provider_id, hits = hits.len(), "Search index responded.");

		Ok(hits)
	}
}

fn build_search_body(query: &str, limit: u32, vector_fields: &[String], k_nearest: u32) -> Value {
	let mut body = serde_json::json!({
		"search": query,
		"top": limit,
	});

	if !vector_fields.is_empty() {
		body["vectorQueries"] = serde_json::json!([
			{
				"kind": "text",
				"text": query,
				"fields": vector_fields.join(","),
				"k": k_nearest,
			}
		]);
	}

	body
}

fn parse_search_response(json: Value) -> Result<Vec<Value>> {
	match json {
		Value::Object(mut map) => match map.remove("value") {
			Some(Value::Array(hits)) => Ok(hits),
			_ => Err(Error::InvalidResponse {
				message: "Search response is missing value array.".to_string(),
			}),
		},
		_ => Err(Error::InvalidResponse {
			message: "Search response must be a JSON object.".to_string(),
		}),
	}
}
