use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use sift_domain::{scope::ViewerScope, source::SourceType};
use sift_service::{
	Error as ServiceError,
	ingest::IngestOp,
	query::{QueryRequest, QueryResponse},
	search::RagResultItem,
	similar::SimilarRequest,
	viewer::resolve_viewer,
};
use sift_storage::sources;

use crate::{rate_limit::Decision, state::AppState};

const USER_ID_HEADER: &str = "x-sift-user-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/rag/query", post(query))
		.route("/v1/rag/similar_tickets", post(similar_tickets))
		.route("/v1/rag/similar_replies", post(similar_replies))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/backfill", post(backfill))
		.route("/v1/admin/purge", post(purge))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
	let scope = admit(&state, &headers).await?;
	let response = state.service.query_rag(&scope, &payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct SimilarResponse {
	results: Vec<RagResultItem>,
}

async fn similar_tickets(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<SimilarRequest>,
) -> Result<Json<SimilarResponse>, ApiError> {
	let scope = admit(&state, &headers).await?;
	let results = state.service.find_similar_tickets(&scope, &payload).await?;

	Ok(Json(SimilarResponse { results }))
}

async fn similar_replies(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<SimilarRequest>,
) -> Result<Json<SimilarResponse>, ApiError> {
	let scope = admit(&state, &headers).await?;
	let results = state.service.find_similar_replies(&scope, &payload).await?;

	Ok(Json(SimilarResponse { results }))
}

#[derive(Debug, Deserialize)]
struct BackfillRequest {
	#[serde(default)]
	source_type_in: Option<Vec<String>>,
	#[serde(default)]
	priority: Option<i32>,
}

#[derive(Debug, Serialize)]
struct BackfillResponse {
	enqueued: usize,
}

/// Enqueues reindex jobs for every source of the requested types. Loopback
/// admin surface, so no user identity or rate limiting applies.
async fn backfill(
	State(state): State<AppState>,
	Json(payload): Json<BackfillRequest>,
) -> Result<Json<BackfillResponse>, ApiError> {
	let source_types = payload.source_type_in.unwrap_or_default();

	for label in &source_types {
		if SourceType::parse(label).is_none() {
			return Err(ApiError::new(
				StatusCode::BAD_REQUEST,
				"validation_error",
				format!("Unknown source type {label}."),
				Some(vec!["source_type_in".to_string()]),
			));
		}
	}

	let refs = sources::source_refs_by_types(&state.service.db, &source_types)
		.await
		.map_err(ServiceError::from)?;
	let priority = payload.priority.unwrap_or(0);
	let mut enqueued = 0;

	for (source_type, provider_ref) in refs {
		let Some(source_type) = SourceType::parse(&source_type) else {
			continue;
		};

		state
			.service
			.enqueue_rag_job(source_type, &provider_ref, IngestOp::Reindex, &json!({}), priority)
			.await?;

		enqueued += 1;
	}

	tracing::info!(enqueued, "Backfill jobs enqueued.");

	Ok(Json(BackfillResponse { enqueued }))
}

#[derive(Debug, Deserialize)]
struct PurgeRequest {
	source_type: String,
	provider_ref: String,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
	source_id: uuid::Uuid,
}

/// Hard-deletes one source, its chunks, and its vector points. The only
/// delete path in the system; everything else is upsert-shaped.
async fn purge(
	State(state): State<AppState>,
	Json(payload): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, ApiError> {
	let Some(source_type) = SourceType::parse(&payload.source_type) else {
		return Err(ApiError::new(
			StatusCode::BAD_REQUEST,
			"validation_error",
			format!("Unknown source type {}.", payload.source_type),
			Some(vec!["source_type".to_string()]),
		));
	};
	let source_id = state.service.purge_source(source_type, &payload.provider_ref).await?;

	Ok(Json(PurgeResponse { source_id }))
}

/// Identity plus rate limiting, shared by every public route. The user id is
/// asserted by the trusted upstream proxy in a header.
async fn admit(state: &AppState, headers: &HeaderMap) -> Result<ViewerScope, ApiError> {
	let user_id = user_id_from(headers)?;
	let origin = origin_from(headers);

	if let Decision::Limited { retry_at } = state.limiter.check(user_id, &origin, OffsetDateTime::now_utc()) {
		return Err(ApiError::rate_limited(retry_at));
	}

	let scope = resolve_viewer(&state.service.db, user_id).await?;

	Ok(scope)
}

fn user_id_from(headers: &HeaderMap) -> Result<i64, ApiError> {
	headers
		.get(USER_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse::<i64>().ok())
		.ok_or_else(|| {
			ApiError::new(
				StatusCode::BAD_REQUEST,
				"validation_error",
				format!("Missing or invalid {USER_ID_HEADER} header."),
				Some(vec![USER_ID_HEADER.to_string()]),
			)
		})
}

fn origin_from(headers: &HeaderMap) -> String {
	headers
		.get(FORWARDED_FOR_HEADER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.split(',').next())
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
		.unwrap_or_else(|| "local".to_string())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	fields: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	retry_at: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
	retry_at: Option<String>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self {
			status,
			error_code: error_code.into(),
			message: message.into(),
			fields,
			retry_at: None,
		}
	}

	fn rate_limited(retry_at: OffsetDateTime) -> Self {
		let retry_at = retry_at.format(&Rfc3339).ok();

		Self {
			status: StatusCode::TOO_MANY_REQUESTS,
			error_code: "rate_limited".to_string(),
			message: "Rate limit exceeded.".to_string(),
			fields: None,
			retry_at,
		}
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::AccessDenied { reason } => ApiError::new(
				StatusCode::FORBIDDEN,
				reason.code(),
				format!("Access denied: {reason}."),
				None,
			),
			ServiceError::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message, None),
			ServiceError::NotFound { message } =>
				ApiError::new(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Provider { .. }
			| ServiceError::Storage(_)
			| ServiceError::Qdrant { .. } => {
				tracing::error!(error = %err, "Request failed.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"server_error",
					"Internal error.",
					None,
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
			retry_at: self.retry_at,
		};

		(self.status, Json(body)).into_response()
	}
}
