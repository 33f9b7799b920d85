mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ChainSettings, Chains, Concurrency, Config, LlmProviderConfig, Providers, Retrieval,
	SearchProviderConfig, Service,
};

use std::{fs, path::Path};

use serde_json::{Map, Value};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind", "must be non-empty."));
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::invalid("service.log_level", "must be non-empty."));
	}

	let llm = &cfg.providers.llm;

	if llm.model.trim().is_empty() {
		return Err(Error::invalid("providers.llm.model", "must be non-empty."));
	}
	if !llm.temperature.is_finite() {
		return Err(Error::invalid("providers.llm.temperature", "must be a finite number."));
	}
	if !(0.0..=2.0).contains(&llm.temperature) {
		return Err(Error::invalid("providers.llm.temperature", "must be in the range 0.0-2.0."));
	}
	if llm.timeout_ms == 0 {
		return Err(Error::invalid("providers.llm.timeout_ms", "must be greater than zero."));
	}
	if cfg.providers.search.timeout_ms == 0 {
		return Err(Error::invalid("providers.search.timeout_ms", "must be greater than zero."));
	}
	if !cfg.providers.search.vector_fields.is_empty() && cfg.providers.search.k_nearest == 0 {
		return Err(Error::invalid(
			"providers.search.k_nearest",
			"must be greater than zero when vector_fields is set.",
		));
	}

	for (label, key) in [("llm", &llm.api_key), ("search", &cfg.providers.search.api_key)] {
		if key.trim().is_empty() {
			return Err(Error::invalid(format!("providers.{label}.api_key"), "must be non-empty."));
		}
	}
	for (label, headers) in [
		("llm", &llm.default_headers),
		("search", &cfg.providers.search.default_headers),
	] {
		validate_headers(&format!("providers.{label}.default_headers"), headers)?;
	}

	if cfg.retrieval.limit == 0 {
		return Err(Error::invalid("retrieval.limit", "must be greater than zero."));
	}
	if cfg.retrieval.min_action_score < 0 || cfg.retrieval.min_outcomes_score < 0 {
		return Err(Error::invalid(
			"retrieval.min_action_score/min_outcomes_score",
			"must be zero or greater.",
		));
	}

	for (label, chain) in [
		("pertinence", &cfg.chains.pertinence),
		("summary", &cfg.chains.summary),
		("mechanisms", &cfg.chains.mechanisms),
	] {
		if chain.batch_size == 0 {
			return Err(Error::invalid(
				format!("chains.{label}.batch_size"),
				"must be greater than zero.",
			));
		}
		if chain.max_tokens == 0 {
			return Err(Error::invalid(
				format!("chains.{label}.max_tokens"),
				"must be greater than zero.",
			));
		}
		if chain.timeout_ms == 0 {
			return Err(Error::invalid(
				format!("chains.{label}.timeout_ms"),
				"must be greater than zero.",
			));
		}
	}

	if cfg.concurrency.max_in_flight == 0 {
		return Err(Error::invalid("concurrency.max_in_flight", "must be greater than zero."));
	}

	Ok(())
}

fn validate_headers(label: &str, headers: &Map<String, Value>) -> Result<()> {
	for (key, value) in headers {
		if key.trim().is_empty() {
			return Err(Error::invalid(label, "must not contain empty header names."));
		}
		if !value.is_string() {
			return Err(Error::invalid(format!("{label}.{key}"), "must be a string."));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for chain in
		[&mut cfg.chains.pertinence, &mut cfg.chains.summary, &mut cfg.chains.mechanisms]
	{
		if chain.model.as_deref().map(|model| model.trim().is_empty()).unwrap_or(false) {
			chain.model = None;
		}
	}

	cfg.providers.search.vector_fields.retain(|field| !field.trim().is_empty());
}
