//! Storage layer for the sleet static feed engine.
//!
//! A feed is a tree of JSON documents under one root URI. This crate defines
//! the file-system-like contract the engine consumes (`StorageFile` /
//! `StorageFileSystem`) and two backends that implement it uniformly:
//!
//! - `LocalFileSystem`: documents on local disk, written via temp-file +
//!   rename so readers never observe a partial write
//! - `MemoryFileSystem`: in-process map, used by tests and dry runs
//!
//! Transient failures (interrupted or timed-out I/O) are retried inside the
//! backends via [`with_retry`]; the engine only observes eventual success or
//! failure.

mod error;
mod file_system;
mod local;
mod memory;
mod retry;

pub use error::{StorageError, StorageResult};
pub use file_system::{StorageFile, StorageFileSystem};
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
pub use retry::{with_retry, RetryPolicy};
