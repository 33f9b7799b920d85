use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
use serde::{Deserialize, Serialize};

use biohack_service::{Error as ServiceError, SearchResponse, SummaryResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/search", get(search))
		.route("/poll_ai_search/", get(poll_search_blank))
		.route("/poll_ai_search/{question}", get(poll_search))
		.route("/poll_ai_summary/", get(poll_summary_blank))
		.route("/poll_ai_summary/{question}", get(poll_summary))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
	#[serde(default)]
	question: String,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&params.question).await?;

	Ok(Json(response))
}

async fn poll_search(
	State(state): State<AppState>,
	Path(question): Path<String>,
) -> Json<SearchResponse> {
	Json(state.service.poll_search(&question))
}

async fn poll_search_blank(State(state): State<AppState>) -> Json<SearchResponse> {
	Json(state.service.poll_search(""))
}

async fn poll_summary(
	State(state): State<AppState>,
	Path(question): Path<String>,
) -> Json<SummaryResponse> {
	Json(state.service.poll_summary(&question))
}

async fn poll_summary_blank(State(state): State<AppState>) -> Json<SummaryResponse> {
	Json(state.service.poll_summary(""))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Retrieval { .. } | ServiceError::Provider { .. } => {
				tracing::error!(error = %err, "Search pipeline failed.");

				Self::new(
					StatusCode::BAD_GATEWAY,
					"upstream_unavailable",
					"Search is temporarily unavailable. Please try again.",
				)
			},
			ServiceError::Internal { .. } => {
				tracing::error!(error = %err, "Search request failed.");

				Self::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Something went wrong. Please try again.",
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
