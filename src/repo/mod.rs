//! Backend handles shared by the facades.
//!
//! A [`Repository`] wraps the document store client. It is built once at startup
//! and cloned into each facade operation, clones share the same client.

pub mod facades;
pub use facades::*;

use crate::store;

#[derive(Clone)]
pub struct Repository {
    store: store::DocumentStoreRef,
}

impl Repository {
    pub fn new(store: store::DocumentStoreRef) -> Self {
        Self { store }
    }

    /// Repository backed by an empty in process document store.
    pub fn in_memory() -> Self {
        Self::new(store::MemoryDocumentStore::new().into_ref())
    }

    pub fn store(&self) -> &dyn store::DocumentStore {
        self.store.as_ref()
    }
}
