use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use users_shared::User;

use crate::db::UserFilter;
use crate::{error::AppError, routes::AppState};

use super::jwt::verify_access_token;

/// The user a valid bearer token resolved to.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_access_token(token, &state.config.jwt)?;

    let user = {
        let mut session = state.db.session().await?;
        session
            .find_first(UserFilter::displayname(claims.sub))
            .await?
            .ok_or(AppError::Unauthorized)?
    };

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
