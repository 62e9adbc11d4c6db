//! MySQL-backed user store
//!
//! The pool is created lazily by [`UserStore::connect`] so the process can
//! start before the database accepts connections. Until then every data
//! operation fails with [`DbError::Connection`].

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::MySqlPool;

use super::pool::{create_pool, DbConfig, PoolSettings};
use super::schema::{self, TimestampColumns};
use super::{DbError, DbResult, UserStore};
use crate::models::{NewUser, User};

/// User store over a sqlx MySQL pool.
pub struct MySqlUserStore {
    options: MySqlConnectOptions,
    settings: PoolSettings,
    allow_alter: bool,
    pool: RwLock<Option<MySqlPool>>,
    /// Set by the last successful reconcile
    timestamps: RwLock<TimestampColumns>,
}

impl MySqlUserStore {
    pub fn new(config: &DbConfig) -> Self {
        Self::from_options(config.connect_options())
    }

    pub fn from_options(options: MySqlConnectOptions) -> Self {
        Self {
            options,
            settings: PoolSettings::default(),
            allow_alter: false,
            pool: RwLock::new(None),
            timestamps: RwLock::new(TimestampColumns::default()),
        }
    }

    pub fn with_pool_settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Allow [`UserStore::reconcile_schema`] to run `ALTER TABLE`.
    pub fn with_schema_alter(mut self, allow_alter: bool) -> Self {
        self.allow_alter = allow_alter;
        self
    }

    fn pool(&self) -> DbResult<MySqlPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| DbError::connection("not connected"))
    }

    fn timestamps(&self) -> TimestampColumns {
        *self.timestamps.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// `SELECT` of every user column, timestamps aliased to the model names.
    fn select_users(&self, tail: &str) -> String {
        let ts = self.timestamps();
        format!(
            "SELECT CAST(id AS UNSIGNED) AS id, name, email, \
             `{}` AS created_at, `{}` AS updated_at FROM users {tail}",
            ts.created, ts.updated
        )
    }

    async fn fetch<'e, E>(&self, executor: E, id: u64) -> DbResult<User>
    where
        E: 'e + sqlx::Executor<'e, Database = sqlx::MySql>,
    {
        let sql = self.select_users("WHERE id = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(DbError::classify)?
            .ok_or_else(|| DbError::user_not_found(id))
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn connect(&self) -> DbResult<()> {
        let pool = create_pool(self.options.clone(), self.settings)
            .await
            .map_err(|e| DbError::connection(e.to_string()))?;

        let previous = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(pool);

        if let Some(previous) = previous {
            previous.close().await;
        }
        Ok(())
    }

    async fn reconcile_schema(&self) -> DbResult<()> {
        let pool = self.pool()?;
        let timestamps = schema::reconcile(&pool, self.allow_alter).await?;
        *self
            .timestamps
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timestamps;
        Ok(())
    }

    async fn find_all(&self) -> DbResult<Vec<User>> {
        let pool = self.pool()?;
        let sql = self.select_users("ORDER BY id");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&pool)
            .await
            .map_err(DbError::classify)
    }

    async fn find_by_id(&self, id: u64) -> DbResult<User> {
        let pool = self.pool()?;
        self.fetch(&pool, id).await
    }

    async fn create(&self, user: NewUser) -> DbResult<User> {
        let pool = self.pool()?;
        let ts = self.timestamps();
        let sql = format!(
            "INSERT INTO users (name, email, `{}`, `{}`) \
             VALUES (?, ?, CURRENT_TIMESTAMP(6), CURRENT_TIMESTAMP(6))",
            ts.created, ts.updated
        );
        let result = sqlx::query(&sql)
            .bind(user.name())
            .bind(user.email())
            .execute(&pool)
            .await
            .map_err(DbError::classify)?;

        self.fetch(&pool, result.last_insert_id()).await
    }

    /// Row lock, update, and read back in one transaction so a concurrent
    /// delete cannot turn the update into a silent no-op.
    async fn update(&self, id: u64, user: NewUser) -> DbResult<User> {
        let pool = self.pool()?;
        let mut tx = pool.begin().await.map_err(DbError::classify)?;

        let locked: Option<u64> = sqlx::query_scalar(
            "SELECT CAST(id AS UNSIGNED) FROM users WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::classify)?;

        if locked.is_none() {
            return Err(DbError::user_not_found(id));
        }

        let sql = format!(
            "UPDATE users SET name = ?, email = ?, `{}` = CURRENT_TIMESTAMP(6) WHERE id = ?",
            self.timestamps().updated
        );
        sqlx::query(&sql)
            .bind(user.name())
            .bind(user.email())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::classify)?;

        let updated = self.fetch(&mut *tx, id).await?;

        tx.commit().await.map_err(DbError::classify)?;
        Ok(updated)
    }

    async fn delete(&self, id: u64) -> DbResult<()> {
        let pool = self.pool()?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .map_err(DbError::classify)?;

        if result.rows_affected() == 0 {
            return Err(DbError::user_not_found(id));
        }
        Ok(())
    }
}
