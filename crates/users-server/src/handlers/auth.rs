use axum::{extract::State, Json};
use users_shared::api::{LoginRequest, TokenResponse};

use crate::auth::{authenticate_user, create_access_token};
use crate::error::AppError;
use crate::extractors::{DbSession, FormBody};
use crate::routes::AppState;

/// POST /auth/token
#[utoipa::path(
    post,
    path = "/auth/token",
    tag = "auth",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Bearer token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    DbSession(mut session): DbSession,
    FormBody(req): FormBody<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = authenticate_user(&mut session, &req.username, &req.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    // The subject is the display name the token will be resolved by.
    let subject = user.displayname.unwrap_or(req.username);
    let access_token = create_access_token(&subject, &state.config.jwt)?;

    tracing::info!("Issued access token for user {}", user.id);
    Ok(Json(TokenResponse::bearer(access_token)))
}
