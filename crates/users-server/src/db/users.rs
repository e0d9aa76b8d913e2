use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use users_shared::api::{UserInput, UserUpdate};
use users_shared::{User, DISPLAYNAME_MAX_LEN};

use super::memory::MemoryEntity;
use super::postgres::PgEntity;
use super::{Entity, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub displayname: Option<String>,
}

impl UserFilter {
    pub fn displayname(name: impl Into<String>) -> Self {
        Self {
            displayname: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserOrder {
    #[default]
    Id,
    Displayname,
    CreatedAt,
    UpdatedAt,
}

impl UserOrder {
    pub fn parse(column: &str) -> Option<Self> {
        match column {
            "id" => Some(Self::Id),
            "displayname" => Some(Self::Displayname),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";

    type Create = UserInput;
    type Update = UserUpdate;
    type Filter = UserFilter;
    type Order = UserOrder;

    fn id(&self) -> i32 {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl PgEntity for User {
    const COLUMNS: &'static str = "id, displayname, created_at, updated_at";

    fn push_insert(qb: &mut QueryBuilder<'_, Postgres>, input: &UserInput, now: DateTime<Utc>) {
        qb.push("(displayname, created_at, updated_at) VALUES (");
        let mut values = qb.separated(", ");
        values.push_bind(input.displayname.clone());
        values.push_bind(now);
        values.push_bind(now);
        values.push_unseparated(")");
    }

    fn push_assignments(qb: &mut QueryBuilder<'_, Postgres>, fields: &UserUpdate) {
        if let Some(name) = &fields.displayname {
            qb.push("displayname = ").push_bind(name.clone()).push(", ");
        }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
        if let Some(name) = &filter.displayname {
            qb.push(" AND displayname = ").push_bind(name.clone());
        }
    }

    fn order_column(order: UserOrder) -> &'static str {
        match order {
            UserOrder::Id => "id",
            UserOrder::Displayname => "displayname",
            UserOrder::CreatedAt => "created_at",
            UserOrder::UpdatedAt => "updated_at",
        }
    }
}

impl MemoryEntity for User {
    fn build(id: i32, input: UserInput, now: DateTime<Utc>) -> Result<Self, StoreError> {
        check_length(&input.displayname)?;
        Ok(User {
            id,
            displayname: Some(input.displayname),
            created_at: now,
            updated_at: now,
        })
    }

    fn apply(&mut self, fields: UserUpdate, now: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(name) = fields.displayname {
            check_length(&name)?;
            self.displayname = Some(name);
        }
        self.updated_at = now;
        Ok(())
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        match &filter.displayname {
            Some(name) => self.displayname.as_deref() == Some(name.as_str()),
            None => true,
        }
    }

    fn compare(&self, other: &Self, order: UserOrder) -> std::cmp::Ordering {
        match order {
            UserOrder::Id => self.id.cmp(&other.id),
            UserOrder::Displayname => self.displayname.cmp(&other.displayname),
            UserOrder::CreatedAt => self.created_at.cmp(&other.created_at),
            UserOrder::UpdatedAt => self.updated_at.cmp(&other.updated_at),
        }
    }
}

// Mirrors the VARCHAR(255) column constraint.
fn check_length(name: &str) -> Result<(), StoreError> {
    if name.chars().count() > DISPLAYNAME_MAX_LEN {
        return Err(StoreError::Rejected(format!(
            "value too long for users.displayname (max {})",
            DISPLAYNAME_MAX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_parses_known_columns_only() {
        assert_eq!(UserOrder::parse("created_at"), Some(UserOrder::CreatedAt));
        assert_eq!(UserOrder::parse("id"), Some(UserOrder::Id));
        assert_eq!(UserOrder::parse("id; DROP TABLE users"), None);
    }

    #[test]
    fn as_dict_exposes_every_column() {
        let now = Utc::now();
        let user = User {
            id: 7,
            displayname: Some("ada".to_string()),
            created_at: now,
            updated_at: now,
        };
        let dict = user.as_dict();
        assert_eq!(dict.len(), 4);
        assert_eq!(dict["id"], 7);
        assert_eq!(dict["displayname"], "ada");
    }

    #[test]
    fn insert_statement_binds_both_timestamps() {
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO users ");
        let input = UserInput {
            displayname: "ada".to_string(),
        };
        User::push_insert(&mut qb, &input, Utc::now());
        assert_eq!(
            qb.sql(),
            "INSERT INTO users (displayname, created_at, updated_at) VALUES ($1, $2, $3)"
        );
    }
}
