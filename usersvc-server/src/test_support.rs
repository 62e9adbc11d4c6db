//! In-process fakes for the data layer and the retry clock

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{DbError, DbResult, UserStore};
use crate::models::{NewUser, User};
use crate::startup::Delay;

#[derive(Default)]
struct Table {
    users: BTreeMap<u64, User>,
    last_id: u64,
}

/// User store backed by a map. Connects and reconciles instantly.
#[derive(Default)]
pub struct MemoryUserStore {
    table: Mutex<Table>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().users.len()
    }

    fn email_taken(table: &Table, email: &str, except: Option<u64>) -> bool {
        table
            .users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn connect(&self) -> DbResult<()> {
        Ok(())
    }

    async fn reconcile_schema(&self) -> DbResult<()> {
        Ok(())
    }

    async fn find_all(&self) -> DbResult<Vec<User>> {
        Ok(self.table.lock().unwrap().users.values().cloned().collect())
    }

    async fn find_by_id(&self, id: u64) -> DbResult<User> {
        self.table
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::user_not_found(id))
    }

    async fn create(&self, user: NewUser) -> DbResult<User> {
        let mut table = self.table.lock().unwrap();
        if Self::email_taken(&table, user.email(), None) {
            return Err(DbError::Conflict("email already in use".into()));
        }

        table.last_id += 1;
        let now = Utc::now();
        let created = User {
            id: table.last_id,
            name: user.name().to_owned(),
            email: user.email().to_owned(),
            created_at: now,
            updated_at: now,
        };
        table.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: u64, user: NewUser) -> DbResult<User> {
        let mut table = self.table.lock().unwrap();
        if !table.users.contains_key(&id) {
            return Err(DbError::user_not_found(id));
        }
        if Self::email_taken(&table, user.email(), Some(id)) {
            return Err(DbError::Conflict("email already in use".into()));
        }

        let existing = table
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::user_not_found(id))?;
        existing.name = user.name().to_owned();
        existing.email = user.email().to_owned();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: u64) -> DbResult<()> {
        self.table
            .lock()
            .unwrap()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::user_not_found(id))
    }
}

/// What one connect-and-reconcile attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ConnectFails,
    ReconcileFails,
    Succeeds,
}

/// Store whose startup calls follow a script, one [`Step`] per attempt.
///
/// Once the script runs out every further attempt uses `then`. Data
/// operations go to an inner [`MemoryUserStore`].
pub struct ScriptedStore {
    script: Vec<Step>,
    then: Step,
    connects: AtomicU32,
    reconciles: AtomicU32,
    inner: MemoryUserStore,
}

impl ScriptedStore {
    pub fn new(script: Vec<Step>, then: Step) -> Self {
        Self {
            script,
            then,
            connects: AtomicU32::new(0),
            reconciles: AtomicU32::new(0),
            inner: MemoryUserStore::new(),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn reconciles(&self) -> u32 {
        self.reconciles.load(Ordering::SeqCst)
    }

    /// Step for the attempt currently in progress.
    fn current(&self) -> Step {
        let attempt = self.connects() as usize;
        self.script
            .get(attempt.saturating_sub(1))
            .copied()
            .unwrap_or(self.then)
    }
}

#[async_trait]
impl UserStore for ScriptedStore {
    async fn connect(&self) -> DbResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.current() {
            Step::ConnectFails => Err(DbError::connection("connection refused")),
            _ => Ok(()),
        }
    }

    async fn reconcile_schema(&self) -> DbResult<()> {
        self.reconciles.fetch_add(1, Ordering::SeqCst);
        match self.current() {
            Step::ReconcileFails => Err(DbError::schema("column `name` has type `int`")),
            _ => Ok(()),
        }
    }

    async fn find_all(&self) -> DbResult<Vec<User>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: u64) -> DbResult<User> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, user: NewUser) -> DbResult<User> {
        self.inner.create(user).await
    }

    async fn update(&self, id: u64, user: NewUser) -> DbResult<User> {
        self.inner.update(id, user).await
    }

    async fn delete(&self, id: u64) -> DbResult<()> {
        self.inner.delete(id).await
    }
}

/// Delay that records each requested wait and returns at once.
#[derive(Default)]
pub struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
