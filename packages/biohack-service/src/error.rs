pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval error: {message}")]
	Retrieval { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl From<biohack_providers::Error> for Error {
	fn from(err: biohack_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
