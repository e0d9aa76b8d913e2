use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::auth_middleware;
use crate::config::CorsConfig;
use crate::db::Database;
use crate::docs;
use crate::handlers::{auth as auth_handlers, users as user_handlers};
use crate::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: Arc<Config>,
}

pub fn create_router(db: Arc<dyn Database>, config: Config) -> anyhow::Result<Router> {
    let cors = build_cors_layer(&config.cors)?;
    let expose_docs = config.environment.is_debug();
    let app_name = config.app_name.clone();

    let state = AppState {
        db,
        config: Arc::new(config),
    };

    // Creation and listing stay public
    let public_user_routes = Router::new().route(
        "/",
        post(user_handlers::create_user).get(user_handlers::list_users),
    );

    let protected_user_routes = Router::new()
        .route(
            "/:id",
            get(user_handlers::get_user)
                .put(user_handlers::update_user)
                .delete(user_handlers::delete_user),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let user_routes = Router::new()
        .merge(public_user_routes)
        .merge(protected_user_routes);

    let auth_routes = Router::new().route("/token", post(auth_handlers::login));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/user", user_routes)
        .nest("/auth", auth_routes);

    if expose_docs {
        let doc = docs::openapi(&app_name);
        router = router.route(
            "/openapi.json",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        );
    }

    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state))
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let any_origin = config.origins.iter().any(|o| o == "*");
    let any_header = config.headers.iter().any(|h| h == "*");

    let mut layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    layer = if any_header {
        layer.allow_headers(Any)
    } else {
        let headers = config
            .headers
            .iter()
            .map(|h| HeaderName::try_from(h.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid CORS_HEADERS entry")?;
        layer.allow_headers(headers)
    };

    if any_origin {
        // Credentials cannot be combined with a wildcard origin
        return Ok(layer.allow_origin(Any));
    }

    let origins = config
        .origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid CORS_ORIGINS entry")?;

    layer = match &config.origins_regex {
        Some(pattern) => {
            let regex = Regex::new(pattern).context("invalid CORS_ORIGINS_REGEX")?;
            layer.allow_origin(AllowOrigin::predicate(move |origin, _parts| {
                origins.contains(origin)
                    || origin.to_str().map(|o| regex.is_match(o)).unwrap_or(false)
            }))
        }
        None => layer.allow_origin(origins),
    };

    if !any_header {
        layer = layer.allow_credentials(true);
    }

    Ok(layer)
}
