//! In-memory store doubles for tests.
//!
//! Both mirror the semantics of the production adapters closely enough to
//! drive the poller end to end without PostgreSQL or object storage.

mod memory_blobs;
mod memory_store;

pub use memory_blobs::{MemoryBlobStore, StoredObject};
pub use memory_store::{IllegalTransition, MemoryJobStore};
