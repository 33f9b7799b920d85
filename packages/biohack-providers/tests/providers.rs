use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use biohack_providers::Error;

#[test]
fn builds_bearer_auth_header() {
	let headers =
		biohack_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn builds_api_key_header_with_defaults() {
	let mut defaults = Map::new();

	defaults.insert("x-ms-client".to_string(), Value::String("biohack".to_string()));

	let headers =
		biohack_providers::api_key_headers("secret", &defaults).expect("Failed to build headers.");

	assert_eq!(headers.get("api-key").expect("Missing api-key header."), "secret");
	assert_eq!(headers.get("x-ms-client").expect("Missing default header."), "biohack");
	assert!(headers.get(AUTHORIZATION).is_none());
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	let err = biohack_providers::auth_headers("secret", &defaults)
		.expect_err("Expected invalid header config.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn transient_statuses_are_retryable() {
	assert!(Error::Status { status: 503, body: String::new() }.is_transient());
	assert!(Error::Status { status: 429, body: String::new() }.is_transient());
	assert!(!Error::Status { status: 401, body: String::new() }.is_transient());
	assert!(!Error::ContentPolicy { message: "filtered".to_string() }.is_transient());
}
