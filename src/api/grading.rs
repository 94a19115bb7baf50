use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentSession;
use crate::api::validation::parse_document_role;
use crate::core::state::AppState;
use crate::schemas::grading::{GradingResultResponse, UploadAck, WorkflowStatusResponse};
use crate::workflow::intake::UploadSlot;
use crate::workflow::orchestrator::WorkflowError;

/// One detail string for every run failure; the kinds stay apart in logs
/// and metrics only.
const ANALYSIS_FAILED_DETAIL: &str = "Failed to analyze. Please try again.";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/documents/:role", post(upload_document))
        .route("/status", get(status))
        .route("/analyze", post(analyze))
        .route("/result", get(result))
}

/// Stores a document in the named slot, replacing any previous selection.
/// Content is accepted as-is: the extension filter belongs to the file
/// picker, and undecodable bytes are only discovered during a grading run.
async fn upload_document(
    Path(role): Path<String>,
    current: CurrentSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadAck>, ApiError> {
    let role = parse_document_role(&role)?;

    let max_bytes = state.settings().intake().max_upload_size_mb * 1024 * 1024;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
            {
                let next_size = bytes.len() as u64 + chunk.len() as u64;
                if next_size > max_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "File size exceeds {}MB limit",
                        state.settings().intake().max_upload_size_mb
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            file_bytes = Some(bytes);
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    let filename = filename.unwrap_or_else(|| "document.txt".to_string());
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    tracing::info!(
        role = %role,
        file = %filename,
        size_bytes = file_bytes.len(),
        "Document received"
    );

    let slot = UploadSlot { bytes: file_bytes, filename: filename.clone(), content_type };
    let message = current.session.lock().await.intake_mut().set_document(role, slot);

    Ok(Json(UploadAck { message, role, filename }))
}

async fn status(
    current: CurrentSession,
    State(state): State<AppState>,
) -> Json<WorkflowStatusResponse> {
    let guard = current.session.lock().await;
    Json(WorkflowStatusResponse::from_session(
        &guard,
        state.settings().intake().accepted_extensions.clone(),
    ))
}

/// Runs the grading state machine over the session's slots. Failures of a
/// run all surface with the same retry prompt; the precondition and the
/// in-flight guard answer differently because nothing ran.
async fn analyze(
    current: CurrentSession,
    State(state): State<AppState>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    match state.orchestrator().analyze(&current.session).await {
        Ok(result) => Ok(Json(GradingResultResponse::from_result(&result))),
        Err(WorkflowError::Precondition) => {
            Err(ApiError::BadRequest("Please upload both files before analyzing".to_string()))
        }
        Err(WorkflowError::InFlight) => {
            Err(ApiError::Conflict("Analysis is already in progress".to_string()))
        }
        Err(err) => {
            tracing::error!(error = %err, kind = failure_kind(&err), "Grading run failed");
            Err(ApiError::ServiceUnavailable(ANALYSIS_FAILED_DETAIL.to_string()))
        }
    }
}

async fn result(current: CurrentSession) -> Result<Json<GradingResultResponse>, ApiError> {
    let guard = current.session.lock().await;
    match guard.last_result() {
        Some(result) => Ok(Json(GradingResultResponse::from_result(result))),
        None => Err(ApiError::NotFound("No grading result available".to_string())),
    }
}

fn failure_kind(err: &WorkflowError) -> &'static str {
    match err {
        WorkflowError::Decode { .. } => "decode",
        WorkflowError::Timeout => "timeout",
        _ => "service",
    }
}
