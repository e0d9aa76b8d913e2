use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use users_shared::{
    api::{UserInput, UserResponse, UserUpdate},
    PageParams, PagedResponse,
};
use utoipa::IntoParams;

use crate::auth::CurrentUser;
use crate::db::{Direction, FilterQuery, UserFilter, UserOrder};
use crate::error::AppError;
use crate::extractors::{DbSession, JsonBody, PathParam, QueryParams};
use crate::routes::AppState;

/// POST /user
#[utoipa::path(
    post,
    path = "/user",
    tag = "users",
    request_body = UserInput,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "The store rejected the user"),
        (status = 422, description = "Invalid body"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    input.validate()?;

    // Any store failure on this path, connecting included, is a creation error.
    let mut session = state.db.session().await.map_err(AppError::CreationFailed)?;
    let user = session
        .create(input)
        .await
        .map_err(AppError::CreationFailed)?;

    tracing::debug!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /user/:id
#[utoipa::path(
    get,
    path = "/user/{id}",
    tag = "users",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such user"),
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    mut session: DbSession,
    PathParam(user_id): PathParam<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let user = session.get_by_id(user_id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user.into()))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Exact display name match.
    pub displayname: Option<String>,
    /// One of `id`, `displayname`, `created_at`, `updated_at`.
    pub order_by: Option<String>,
    /// `asc` or `desc`.
    pub order: Option<String>,
}

impl UserListQuery {
    fn ordering(&self) -> Result<(UserOrder, Direction), AppError> {
        let column = match self.order_by.as_deref() {
            Some(name) => UserOrder::parse(name)
                .ok_or_else(|| AppError::Validation(format!("cannot order by '{}'", name)))?,
            None => UserOrder::Id,
        };

        let direction = match self.order.as_deref() {
            Some("desc") | Some("DESC") => Direction::Desc,
            Some("asc") | Some("ASC") | None => Direction::Asc,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "order must be 'asc' or 'desc', got '{}'",
                    other
                )))
            }
        };

        Ok((column, direction))
    }
}

/// GET /user
#[utoipa::path(
    get,
    path = "/user",
    tag = "users",
    params(PageParams, UserListQuery),
    responses(
        (status = 200, description = "One page of users", body = PagedResponse<UserResponse>),
        (status = 422, description = "Invalid paging or ordering"),
    )
)]
pub async fn list_users(
    mut session: DbSession,
    QueryParams(page): QueryParams<PageParams>,
    QueryParams(params): QueryParams<UserListQuery>,
) -> Result<Json<PagedResponse<UserResponse>>, AppError> {
    page.validate()?;
    let (order, direction) = params.ordering()?;

    let filter = UserFilter {
        displayname: params.displayname,
    };
    let found = session
        .filter(
            FilterQuery::new(filter)
                .order_by(order, direction)
                .offset(page.offset())
                .limit(page.limit())
                .with_count(),
        )
        .await?;

    let total = found.total.unwrap_or_default();
    let users = PagedResponse::new(page, total, found.rows);

    Ok(Json(users.map(UserResponse::from)))
}

/// PUT /user/:id
#[utoipa::path(
    put,
    path = "/user/{id}",
    tag = "users",
    params(("id" = i32, Path, description = "User id")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "The updated user", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such user"),
        (status = 422, description = "Invalid body"),
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    mut session: DbSession,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    PathParam(user_id): PathParam<i32>,
    JsonBody(fields): JsonBody<UserUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    fields.validate()?;

    let user = session
        .update(user_id, fields)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::debug!("User {} updated user {}", actor.id, user.id);
    Ok(Json(user.into()))
}

/// DELETE /user/:id
#[utoipa::path(
    delete,
    path = "/user/{id}",
    tag = "users",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such user"),
    ),
    security(("bearer" = []))
)]
pub async fn delete_user(
    mut session: DbSession,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    PathParam(user_id): PathParam<i32>,
) -> Result<StatusCode, AppError> {
    if !session.delete(user_id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!("User {} deleted user {}", actor.id, user_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_defaults_to_ascending_id() {
        let query = UserListQuery::default();
        assert_eq!(query.ordering().unwrap(), (UserOrder::Id, Direction::Asc));
    }

    #[test]
    fn ordering_rejects_unknown_values() {
        let bad_column = UserListQuery {
            order_by: Some("password".to_string()),
            ..Default::default()
        };
        assert!(bad_column.ordering().is_err());

        let bad_direction = UserListQuery {
            order: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(bad_direction.ordering().is_err());
    }
}
