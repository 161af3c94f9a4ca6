//! A headers-only SPV Bitcoin peer: wire codec, header chain engine with
//! reorg support, a single peer session, and crash-safe header
//! persistence.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod primitives;
pub mod storage;
pub mod utils;

pub use error::{NodeError, Result};
