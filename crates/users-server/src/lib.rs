pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use config::Config;
pub use db::DbPool;
pub use routes::{create_router, AppState};
