//! Request extractors: the per-request database session and wrappers that
//! turn axum's input rejections into [`AppError::Validation`].

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use std::ops::{Deref, DerefMut};

use crate::db::Session;
use crate::error::AppError;
use crate::routes::AppState;

/// A session opened when the handler starts and released when the handler
/// returns, whatever the outcome.
pub struct DbSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for DbSession {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = state.db.session().await?;
        Ok(DbSession(session))
    }
}

impl Deref for DbSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// JSON body; a malformed or mistyped body is a 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// URL-encoded form body.
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct FormBody<T>(pub T);

/// Query string, e.g. `page=-1` or `size=abc` is a 422.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Path segment, e.g. `/user/abc` is a 422.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);
