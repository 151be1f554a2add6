use super::super::dto::ErrorResponse;
use super::super::state::ServerState;
use crate::application::auth::AccessCredential;
use crate::application::service::BriefingError;
use crate::domain::types::DayPlanResult;
use crate::infrastructure::model::ModelProvider;
use axum::extract::State;
use axum::http::header::{ACCEPT_LANGUAGE, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_LANGUAGE: &str = "en-US";

/// Bearer value of the Authorization header, empty when absent or malformed.
/// The token exchange downstream degrades to an empty bearer anyway, so a
/// missing header is not rejected here.
fn extract_credential(headers: &HeaderMap) -> AccessCredential {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
        .unwrap_or_default();
    AccessCredential::new(token)
}

/// First entry of the Accept-Language header, without quality weights.
fn extract_language(headers: &HeaderMap) -> String {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.split(';').next().unwrap_or(value).trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

#[utoipa::path(
    get,
    path = "/briefing",
    tag = "briefing",
    responses(
        (status = 200, description = "Today's meetings, ordered by start time", body = DayPlanResult),
        (status = 500, description = "Plugin manifests could not be loaded", body = ErrorResponse),
        (status = 502, description = "The model backend failed or misbehaved", body = ErrorResponse)
    )
)]
pub async fn briefing_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    headers: HeaderMap,
) -> Result<Json<DayPlanResult>, (StatusCode, Json<ErrorResponse>)> {
    let credential = extract_credential(&headers);
    let language = extract_language(&headers);
    info!(%language, authenticated = !credential.is_empty(), "Received /briefing request");

    let cancel = CancellationToken::new();
    match state.service().briefing(credential, language, &cancel).await {
        Ok(plan) => {
            info!(meetings = plan.meetings.len(), "Briefing request completed");
            Ok(Json(plan))
        }
        Err(error) => {
            error!(%error, "Briefing request failed");
            let status = match &error {
                BriefingError::Plugins(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BriefingError::Orchestrator(_) => StatusCode::BAD_GATEWAY,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            ))
        }
    }
}
