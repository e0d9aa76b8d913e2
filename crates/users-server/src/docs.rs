use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use users_shared::api::{LoginRequest, TokenResponse, UserInput, UserResponse, UserUpdate};

use crate::handlers::{auth, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        auth::login,
    ),
    components(schemas(UserInput, UserUpdate, UserResponse, LoginRequest, TokenResponse)),
    modifiers(&BearerAuth),
    tags(
        (name = "users", description = "User CRUD"),
        (name = "auth", description = "Development-only token issuance"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI document titled after the running application.
pub fn openapi(app_name: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = format!("{} API", app_name);
    doc
}
