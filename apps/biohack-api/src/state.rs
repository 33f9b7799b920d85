use std::sync::Arc;

use biohack_service::BiohackService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BiohackService>,
}
impl AppState {
	pub fn new(config: biohack_config::Config) -> biohack_service::Result<Self> {
		Ok(Self::with_service(Arc::new(BiohackService::new(config)?)))
	}

	pub fn with_service(service: Arc<BiohackService>) -> Self {
		Self { service }
	}
}
