//! In-process backend used by the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use users_shared::User;

use super::{Crud, Database, Direction, Entity, FilterQuery, Filtered, Session, StoreError};

/// Row behaviour an entity needs to live in a [`MemoryTable`].
pub trait MemoryEntity: Entity {
    fn build(id: i32, input: Self::Create, now: DateTime<Utc>) -> Result<Self, StoreError>;

    fn apply(&mut self, fields: Self::Update, now: DateTime<Utc>) -> Result<(), StoreError>;

    fn matches(&self, filter: &Self::Filter) -> bool;

    fn compare(&self, other: &Self, order: Self::Order) -> Ordering;
}

#[derive(Debug)]
pub struct MemoryTable<E> {
    next_id: i32,
    rows: BTreeMap<i32, E>,
}

impl<E> Default for MemoryTable<E> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    users: Arc<Mutex<MemoryTable<User>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session(&self) -> Result<Session, StoreError> {
        Ok(Box::new(MemorySession {
            table: Arc::clone(&self.users),
        }))
    }
}

pub struct MemorySession<E> {
    table: Arc<Mutex<MemoryTable<E>>>,
}

impl<E> MemorySession<E> {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryTable<E>>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Rejected("memory table lock poisoned".to_string()))
    }
}

#[async_trait]
impl<E: MemoryEntity> Crud<E> for MemorySession<E> {
    async fn create(&mut self, input: E::Create) -> Result<E, StoreError> {
        let mut table = self.lock()?;
        let id = table.next_id;
        let row = E::build(id, input, Utc::now())?;
        table.next_id += 1;
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&mut self, id: i32) -> Result<Option<E>, StoreError> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn filter(&mut self, query: FilterQuery<E>) -> Result<Filtered<E>, StoreError> {
        let table = self.lock()?;
        let mut matching: Vec<E> = table
            .rows
            .values()
            .filter(|row| row.matches(&query.filter))
            .cloned()
            .collect();
        drop(table);

        if let Some((order, direction)) = query.order {
            matching.sort_by(|a, b| {
                let ord = a.compare(b, order);
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                ord.then_with(|| a.id().cmp(&b.id()))
            });
        }

        let total = query.count.then_some(matching.len() as i64);
        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let rows = match query.limit {
            Some(limit) => matching
                .into_iter()
                .skip(offset)
                .take(limit.max(0) as usize)
                .collect(),
            None => matching.into_iter().skip(offset).collect(),
        };

        Ok(Filtered { rows, total })
    }

    async fn update(&mut self, id: i32, fields: E::Update) -> Result<Option<E>, StoreError> {
        let mut table = self.lock()?;
        let Some(current) = table.rows.get(&id) else {
            return Ok(None);
        };

        // Work on a copy so a rejected write leaves the row untouched.
        let mut updated = current.clone();
        updated.apply(fields, Utc::now())?;
        table.rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&mut self, id: i32) -> Result<bool, StoreError> {
        Ok(self.lock()?.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{UserFilter, UserOrder};
    use users_shared::api::{UserInput, UserUpdate};

    fn input(name: &str) -> UserInput {
        UserInput {
            displayname: name.to_string(),
        }
    }

    async fn session() -> Session {
        MemoryDatabase::new().session().await.unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_and_equal_timestamps() {
        let mut db = session().await;
        let user = db.create(input("ada")).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.displayname.as_deref(), Some("ada"));
        assert_eq!(user.created_at, user.updated_at);

        let second = db.create(input("grace")).await.unwrap();
        assert_ne!(user.id, second.id);
    }

    #[tokio::test]
    async fn get_by_id_reports_absence_without_error() {
        let mut db = session().await;
        assert!(db.get_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_identity_and_creation_time() {
        let mut db = session().await;
        let user = db.create(input("ada")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let updated = db
            .update(
                user.id,
                UserUpdate {
                    displayname: Some("lovelace".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, user.id);
        assert_eq!(updated.created_at, user.created_at);
        assert_eq!(updated.displayname.as_deref(), Some("lovelace"));
        assert!(updated.updated_at > user.updated_at);
    }

    #[tokio::test]
    async fn blind_update_of_missing_id_does_not_fail() {
        let mut db = session().await;
        let result = db.update(99, UserUpdate::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn rejected_update_leaves_row_untouched() {
        let mut db = session().await;
        let user = db.create(input("ada")).await.unwrap();

        let err = db
            .update(
                user.id,
                UserUpdate {
                    displayname: Some("x".repeat(300)),
                },
            )
            .await;
        assert!(matches!(err, Err(StoreError::Rejected(_))));

        let stored = db.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn delete_removes_exactly_once() {
        let mut db = session().await;
        let user = db.create(input("ada")).await.unwrap();

        assert!(db.delete(user.id).await.unwrap());
        assert!(!db.delete(user.id).await.unwrap());
        assert!(db.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filter_counts_ignoring_limit_and_offset() {
        let mut db = session().await;
        for i in 0..25 {
            db.create(input(&format!("user{i:02}"))).await.unwrap();
        }

        let page = db
            .filter(FilterQuery::default().limit(10).offset(20).with_count())
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.total, Some(25));

        let uncounted = db.filter(FilterQuery::default().limit(3)).await.unwrap();
        assert_eq!(uncounted.total, None);
        let ids: Vec<i32> = uncounted.rows.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn filter_applies_predicate_and_order() {
        let mut db = session().await;
        for name in ["carol", "alice", "bob", "alice"] {
            db.create(input(name)).await.unwrap();
        }

        let alices = db
            .filter(FilterQuery::new(UserFilter::displayname("alice")).with_count())
            .await
            .unwrap();
        assert_eq!(alices.total, Some(2));

        let sorted = db
            .filter(FilterQuery::default().order_by(UserOrder::Displayname, Direction::Desc))
            .await
            .unwrap();
        let names: Vec<_> = sorted
            .rows
            .iter()
            .filter_map(|u| u.displayname.as_deref())
            .collect();
        assert_eq!(names, vec!["carol", "bob", "alice", "alice"]);
    }

    #[tokio::test]
    async fn find_first_uses_filter() {
        let mut db = session().await;
        db.create(input("ada")).await.unwrap();

        let found = db.find_first(UserFilter::displayname("ada")).await.unwrap();
        assert!(found.is_some());
        let missing = db.find_first(UserFilter::displayname("bob")).await.unwrap();
        assert!(missing.is_none());
    }
}
