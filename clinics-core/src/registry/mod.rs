//! Use-case context
//!
//! [`Registry`] is built once with its collaborators and shared by every
//! request. Each mutating use case runs in one store transaction that is
//! committed only on success; any early return drops the transaction, which
//! rolls it back. Reads and single-statement writes use an autocommit
//! session.

mod clinics;
mod dentists;
mod users;
mod views;

use std::sync::Arc;

use crate::ids::{Clock, IdGenerator, SystemClock, UuidV7Generator};
use crate::store::Store;
use crate::Result;

/// Clinic registry use cases over a store
#[derive(Clone)]
pub struct Registry<S> {
    store: S,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> Registry<S> {
    /// Registry with UUIDv7 ids and the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            ids: Arc::new(UuidV7Generator),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fails when the store cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }
}
