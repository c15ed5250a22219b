//! error: resource failures surfaced by the query path.
//!
//! Only resource acquisition can fail a query (lock, memory). Missing
//! platform facts never reach this type; they degrade to zero/false.

use std::io;

use thiserror::Error;

pub type QueryResult<T> = core::result::Result<T, QueryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Waiting for the snapshot lock was interrupted; nothing was built.
    #[error("interrupted while waiting for the snapshot lock")]
    Interrupted,
    /// Snapshot buffer could not be allocated; shared state untouched.
    #[error("out of memory allocating a {0}-byte snapshot buffer")]
    OutOfMemory(usize),
    /// Query endpoint could not be registered with the host.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl From<QueryError> for io::Error {
    fn from(e: QueryError) -> Self {
        let kind = match e {
            QueryError::Interrupted => io::ErrorKind::Interrupted,
            QueryError::OutOfMemory(_) => io::ErrorKind::OutOfMemory,
            QueryError::UnsupportedPlatform(_) => io::ErrorKind::Unsupported,
        };
        io::Error::new(kind, e)
    }
}
