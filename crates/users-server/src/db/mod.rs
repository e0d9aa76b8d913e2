//! Persistence layer: one generic CRUD capability shared by every entity,
//! a PostgreSQL backend and an in-process backend for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;
use users_shared::User;

pub mod memory;
pub mod postgres;
pub mod users;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;
pub use users::{UserFilter, UserOrder};

pub type DbPool = PgPool;

pub async fn create_pool(database_url: &str, echo: bool) -> anyhow::Result<DbPool> {
    let mut options = PgConnectOptions::from_str(database_url)?;
    if !echo {
        options = options.disable_statement_logging();
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused a write, e.g. a column constraint.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Columns every persisted entity carries.
pub trait Entity: Serialize + Clone + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;

    type Create: Send + Sync + 'static;
    type Update: Send + Sync + 'static;
    type Filter: Default + Send + Sync + 'static;
    type Order: Copy + Send + Sync + 'static;

    fn id(&self) -> i32;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Column name to value map of the row.
    fn as_dict(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Arguments of [`Crud::filter`]. Without an explicit order rows come back
/// by ascending id so that limit/offset slices are stable.
pub struct FilterQuery<E: Entity> {
    pub filter: E::Filter,
    pub order: Option<(E::Order, Direction)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub count: bool,
}

impl<E: Entity> Default for FilterQuery<E> {
    fn default() -> Self {
        Self {
            filter: E::Filter::default(),
            order: None,
            limit: None,
            offset: None,
            count: false,
        }
    }
}

impl<E: Entity> FilterQuery<E> {
    pub fn new(filter: E::Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: E::Order, direction: Direction) -> Self {
        self.order = Some((order, direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Filtered<E> {
    pub rows: Vec<E>,
    /// Rows matching the filter, ignoring limit/offset. Set when requested.
    pub total: Option<i64>,
}

/// Create/read/update/delete over one entity type.
///
/// Every mutation commits on its own; a failed mutation is rolled back and
/// the error is returned unchanged.
#[async_trait]
pub trait Crud<E: Entity>: Send {
    async fn create(&mut self, input: E::Create) -> Result<E, StoreError>;

    async fn get_by_id(&mut self, id: i32) -> Result<Option<E>, StoreError>;

    async fn filter(&mut self, query: FilterQuery<E>) -> Result<Filtered<E>, StoreError>;

    /// Applies `fields` to the row and bumps `updated_at`. Returns `None`
    /// when no row has this id.
    async fn update(&mut self, id: i32, fields: E::Update) -> Result<Option<E>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&mut self, id: i32) -> Result<bool, StoreError>;

    async fn find_first(&mut self, filter: E::Filter) -> Result<Option<E>, StoreError> {
        let found = self.filter(FilterQuery::new(filter).limit(1)).await?;
        Ok(found.rows.into_iter().next())
    }
}

/// A unit of work bound to one request.
pub type Session = Box<dyn Crud<User>>;

/// Opens sessions. The session is released when it is dropped.
#[async_trait]
pub trait Database: Send + Sync {
    async fn session(&self) -> Result<Session, StoreError>;
}
