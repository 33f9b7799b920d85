pub mod completion;
pub mod search_index;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// Bearer authentication for OpenAI-compatible endpoints.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	merge_default_headers(&mut headers, default_headers)?;

	Ok(headers)
}

/// `api-key` authentication used by search index services.
pub fn api_key_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(HeaderName::from_static("api-key"), HeaderValue::from_str(api_key)?);

	merge_default_headers(&mut headers, default_headers)?;

	Ok(headers)
}

fn merge_default_headers(headers: &mut HeaderMap, defaults: &Map<String, Value>) -> Result<()> {
	for (key, value) in defaults {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(())
}
