use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentSession;
use crate::core::security;
use crate::core::state::AppState;
use crate::schemas::auth::{LoginRequest, LogoutResponse, TokenResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/logout", post(logout))
}

/// Verifies the credential pair and opens a fresh workflow session. Every
/// successful login starts from a clean slate; the previous session, if the
/// same user had one, is simply abandoned.
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !state.credentials().verify(&payload.username, &payload.password) {
        tracing::info!(username = %payload.username, "Rejected login attempt");
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let session_id = state.sessions().create().await;
    let token = security::create_access_token(&session_id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(session_id = %session_id, "Login successful, session opened");

    Ok(Json(TokenResponse { access_token: token, token_type: "bearer".to_string() }))
}

async fn logout(
    current: CurrentSession,
    State(state): State<AppState>,
) -> Json<LogoutResponse> {
    state.sessions().remove(&current.id).await;
    tracing::info!(session_id = %current.id, "Session discarded on logout");
    Json(LogoutResponse { message: "Logged out successfully".to_string() })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn login_rejects_unknown_credentials() {
        let stub = test_support::spawn_evaluator_stub(vec![(200, json!({}))]).await;
        let ctx = test_support::setup_test_context(&stub.base_url).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "163141", "password": "wrong"})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rejects_empty_fields() {
        let stub = test_support::spawn_evaluator_stub(vec![(200, json!({}))]).await;
        let ctx = test_support::setup_test_context(&stub.base_url).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "", "password": ""})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_opens_a_usable_session() {
        let stub = test_support::spawn_evaluator_stub(vec![(200, json!({}))]).await;
        let ctx = test_support::setup_test_context(&stub.base_url).await;

        let token = test_support::authenticate(ctx.app.clone()).await;
        assert_eq!(ctx.state.sessions().len().await, 1);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/grading/status",
                Some(&token),
                None,
            ))
            .await
            .expect("status");

        assert_eq!(response.status(), StatusCode::OK);
        let status = test_support::read_json(response).await;
        assert_eq!(status["phase"], "idle");
        assert_eq!(status["ready"], false);
    }

    #[tokio::test]
    async fn logout_discards_the_session() {
        let stub = test_support::spawn_evaluator_stub(vec![(200, json!({}))]).await;
        let ctx = test_support::setup_test_context(&stub.base_url).await;
        let token = test_support::authenticate(ctx.app.clone()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/logout",
                Some(&token),
                None,
            ))
            .await
            .expect("logout");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.state.sessions().len().await, 0);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/grading/status",
                Some(&token),
                None,
            ))
            .await
            .expect("status after logout");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
