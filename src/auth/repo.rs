use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Persistence for user records. Implementations must reject a second user
/// with an email that is already stored.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Replaces the password hash only if it still equals `expected_hash`.
    /// Returns `false` when no row matched.
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)"#,
        )
        .bind(email)
        .fetch_one(&self.db)
        .await
        .context("exists_by_email")?;
        Ok(exists)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find_by_email")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .fetch_one(&mut *tx)
        .await;

        let created = match created {
            Ok(u) => u,
            Err(e) if is_unique_violation(&e) => {
                debug!(email = %user.email, "insert rejected by unique index");
                return Err(StoreError::DuplicateEmail);
            }
            Err(e) => return Err(anyhow::Error::new(e).context("insert user").into()),
        };

        tx.commit().await.context("commit tx")?;
        Ok(created)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3
             WHERE id = $1 AND password_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(expected_hash)
        .bind(new_hash)
        .execute(&mut *tx)
        .await
        .context("update password hash")?;

        tx.commit().await.context("commit tx")?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use time::OffsetDateTime;

    use super::*;

    /// Process-local store used by service and handler tests.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserStore {
        pub fn password_hash_of(&self, email: &str) -> Option<String> {
            let users = self.users.lock().unwrap();
            users
                .iter()
                .find(|u| u.email == email)
                .map(|u| u.password_hash.clone())
        }

        pub fn count(&self) -> usize {
            self.users.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
            Ok(self.users.lock().unwrap().iter().any(|u| u.email == email))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.email == email).cloned())
        }

        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == user.email) {
                return Err(StoreError::DuplicateEmail);
            }
            let created = User {
                id: Uuid::new_v4(),
                email: user.email,
                password_hash: user.password_hash,
                name: user.name,
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(created.clone());
            Ok(created)
        }

        async fn update_password_hash(
            &self,
            user_id: Uuid,
            expected_hash: &str,
            new_hash: &str,
        ) -> Result<bool, StoreError> {
            let mut users = self.users.lock().unwrap();
            match users
                .iter_mut()
                .find(|u| u.id == user_id && u.password_hash == expected_hash)
            {
                Some(u) => {
                    u.password_hash = new_hash.to_string();
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        let new_user = NewUser {
            email: "a@x.com".into(),
            password_hash: "h1".into(),
            name: "Al".into(),
        };
        store.insert(new_user.clone()).await.expect("first insert");
        let err = store.insert(new_user).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn update_password_hash_requires_expected_hash() {
        let store = MemoryUserStore::default();
        let user = store
            .insert(NewUser {
                email: "a@x.com".into(),
                password_hash: "h1".into(),
                name: "Al".into(),
            })
            .await
            .expect("insert");

        assert!(!store.update_password_hash(user.id, "stale", "h2").await.unwrap());
        assert_eq!(store.password_hash_of("a@x.com").as_deref(), Some("h1"));

        assert!(store.update_password_hash(user.id, "h1", "h2").await.unwrap());
        assert_eq!(store.password_hash_of("a@x.com").as_deref(), Some("h2"));
    }
}
