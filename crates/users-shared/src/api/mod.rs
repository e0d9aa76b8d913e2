mod auth;
mod users;

pub use auth::*;
pub use users::*;
