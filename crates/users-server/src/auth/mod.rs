mod jwt;
mod middleware;
mod password;

pub use jwt::{create_access_token, verify_access_token, Claims};
pub use middleware::{auth_middleware, CurrentUser};
pub use password::{authenticate_user, hash_password, verify_password};
