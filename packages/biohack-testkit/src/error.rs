pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Test config is invalid: {0}")]
	Config(#[from] biohack_config::Error),
}
