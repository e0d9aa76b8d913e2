use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{User, DISPLAYNAME_MAX_LEN};
use crate::ValidationError;

/// Body of `POST /user`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserInput {
    pub displayname: String,
}

impl UserInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_displayname(&self.displayname)
    }
}

/// Body of `PUT /user/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.displayname {
            Some(name) => validate_displayname(name),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub displayname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            displayname: user.displayname,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn validate_displayname(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankDisplayname);
    }
    if name.chars().count() > DISPLAYNAME_MAX_LEN {
        return Err(ValidationError::DisplaynameTooLong {
            max: DISPLAYNAME_MAX_LEN,
        });
    }
    Ok(())
}
