use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{Connection, FromRow, Postgres, QueryBuilder, Transaction};

use super::{Crud, Database, DbPool, Entity, FilterQuery, Filtered, Session, StoreError};

/// SQL fragments an entity contributes to the shared statements.
pub trait PgEntity: Entity + for<'r> FromRow<'r, PgRow> {
    /// Column list used in SELECT and RETURNING clauses.
    const COLUMNS: &'static str;

    /// Pushes `(cols) VALUES (binds)`.
    fn push_insert(qb: &mut QueryBuilder<'_, Postgres>, input: &Self::Create, now: DateTime<Utc>);

    /// Pushes zero or more `col = <bind>, ` fragments.
    fn push_assignments(qb: &mut QueryBuilder<'_, Postgres>, fields: &Self::Update);

    /// Pushes zero or more ` AND <predicate>` fragments.
    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Self::Filter);

    fn order_column(order: Self::Order) -> &'static str;
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: DbPool,
}

impl PgDatabase {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session(&self) -> Result<Session, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }
}

/// One pooled connection held for the lifetime of a request.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("Rollback failed: {}", e);
    }
}

fn insert_statement<E: PgEntity>(
    input: &E::Create,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {} ", E::TABLE));
    E::push_insert(&mut qb, input, now);
    qb.push(format!(" RETURNING {}", E::COLUMNS));
    qb
}

/// Rows without an explicit order come back by ascending id; an explicit
/// order falls back to id to break ties.
fn select_statement<E: PgEntity>(query: &FilterQuery<E>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", E::COLUMNS, E::TABLE));
    E::push_filter(&mut qb, &query.filter);

    match query.order {
        Some((order, direction)) => {
            qb.push(format!(
                " ORDER BY {} {}, id ASC",
                E::order_column(order),
                direction.as_sql()
            ));
        }
        None => {
            qb.push(" ORDER BY id ASC");
        }
    }
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = query.offset {
        qb.push(" OFFSET ").push_bind(offset);
    }
    qb
}

fn count_statement<E: PgEntity>(filter: &E::Filter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", E::TABLE));
    E::push_filter(&mut qb, filter);
    qb
}

/// `updated_at` is always assigned, so an empty update still touches the row.
fn update_statement<E: PgEntity>(
    id: i32,
    fields: &E::Update,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
    E::push_assignments(&mut qb, fields);
    qb.push("updated_at = ").push_bind(now);
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {}", E::COLUMNS));
    qb
}

#[async_trait]
impl<E: PgEntity> Crud<E> for PgSession {
    async fn create(&mut self, input: E::Create) -> Result<E, StoreError> {
        let mut qb = insert_statement::<E>(&input, Utc::now());

        let mut tx = self.conn.begin().await?;
        match qb.build_query_as::<E>().fetch_one(&mut *tx).await {
            Ok(row) => {
                tx.commit().await?;
                Ok(row)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e.into())
            }
        }
    }

    async fn get_by_id(&mut self, id: i32) -> Result<Option<E>, StoreError> {
        let row = sqlx::query_as::<_, E>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            E::COLUMNS,
            E::TABLE
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row)
    }

    async fn filter(&mut self, query: FilterQuery<E>) -> Result<Filtered<E>, StoreError> {
        let mut qb = select_statement(&query);
        let rows = qb.build_query_as::<E>().fetch_all(&mut *self.conn).await?;

        let total = if query.count {
            let mut count_qb = count_statement::<E>(&query.filter);
            let (count,): (i64,) = count_qb
                .build_query_as()
                .fetch_one(&mut *self.conn)
                .await?;
            Some(count)
        } else {
            None
        };

        Ok(Filtered { rows, total })
    }

    async fn update(&mut self, id: i32, fields: E::Update) -> Result<Option<E>, StoreError> {
        let mut qb = update_statement::<E>(id, &fields, Utc::now());

        let mut tx = self.conn.begin().await?;
        match qb.build_query_as::<E>().fetch_optional(&mut *tx).await {
            Ok(row) => {
                tx.commit().await?;
                Ok(row)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e.into())
            }
        }
    }

    async fn delete(&mut self, id: i32) -> Result<bool, StoreError> {
        let mut tx = self.conn.begin().await?;
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", E::TABLE))
            .bind(id)
            .execute(&mut *tx)
            .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                Ok(done.rows_affected() > 0)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Direction, UserFilter, UserOrder};
    use users_shared::api::UserUpdate;
    use users_shared::User;

    #[test]
    fn update_assigns_fields_then_timestamp() {
        let fields = UserUpdate {
            displayname: Some("lovelace".to_string()),
        };
        let qb = update_statement::<User>(7, &fields, Utc::now());
        assert_eq!(
            qb.sql(),
            "UPDATE users SET displayname = $1, updated_at = $2 WHERE id = $3 \
             RETURNING id, displayname, created_at, updated_at"
        );
    }

    #[test]
    fn empty_update_still_bumps_updated_at() {
        let qb = update_statement::<User>(7, &UserUpdate::default(), Utc::now());
        assert_eq!(
            qb.sql(),
            "UPDATE users SET updated_at = $1 WHERE id = $2 \
             RETURNING id, displayname, created_at, updated_at"
        );
    }

    #[test]
    fn select_defaults_to_ascending_id() {
        let qb = select_statement::<User>(&FilterQuery::default());
        assert_eq!(
            qb.sql(),
            "SELECT id, displayname, created_at, updated_at FROM users WHERE TRUE ORDER BY id ASC"
        );
    }

    #[test]
    fn select_breaks_order_ties_by_id_and_pages() {
        let query = FilterQuery::<User>::default()
            .order_by(UserOrder::CreatedAt, Direction::Desc)
            .limit(10)
            .offset(20);
        let qb = select_statement(&query);
        assert_eq!(
            qb.sql(),
            "SELECT id, displayname, created_at, updated_at FROM users WHERE TRUE \
             ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn select_binds_displayname_predicate_first() {
        let query = FilterQuery::<User>::new(UserFilter::displayname("ada")).limit(1);
        let qb = select_statement(&query);
        assert_eq!(
            qb.sql(),
            "SELECT id, displayname, created_at, updated_at FROM users WHERE TRUE \
             AND displayname = $1 ORDER BY id ASC LIMIT $2"
        );
    }

    #[test]
    fn count_ignores_paging() {
        let query = FilterQuery::<User>::new(UserFilter::displayname("ada"))
            .limit(10)
            .offset(20)
            .with_count();
        let qb = count_statement::<User>(&query.filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM users WHERE TRUE AND displayname = $1"
        );
    }
}
