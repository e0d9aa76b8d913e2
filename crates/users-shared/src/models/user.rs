use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of `users.displayname` (VARCHAR(255)).
pub const DISPLAYNAME_MAX_LEN: usize = 255;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i32,
    pub displayname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
