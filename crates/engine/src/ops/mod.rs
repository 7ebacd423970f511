use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::ResultEngine;

mod access;
mod expenses;
mod groups;
mod settlements;
mod summaries;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of the settlement engine.
///
/// Pure computations live in the crate root modules; `Engine` loads the
/// snapshots they need from the database and persists their results.
/// Mutations of one group (expenses, settlement commits) are serialized
/// through a per-group lock held across the whole DB transaction.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    group_locks: GroupLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Waits for exclusive access to `group_id`.
    async fn lock_group(&self, group_id: Uuid) -> OwnedMutexGuard<()> {
        self.group_locks.handle(group_id).lock_owned().await
    }
}

#[derive(Debug, Default)]
struct GroupLocks(Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>);

impl GroupLocks {
    fn handle(&self, group_id: Uuid) -> Arc<AsyncMutex<()>> {
        // The map is only ever inserted into, so a poisoned guard is still usable.
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(group_id).or_default())
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            group_locks: GroupLocks::default(),
        })
    }
}
