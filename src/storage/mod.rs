//! Header persistence: a pluggable embedded-database backend (sled, redb)
//! and the hash/height-indexed header store built on top of it.

pub mod database;
pub mod hashing;
pub mod header_store;

pub use database::{Database, DatabaseBackend, Tree};
pub use header_store::{Cursor, DelOutcome, HeaderStore, PutOutcome, DEFAULT_PAGE_SIZE};
