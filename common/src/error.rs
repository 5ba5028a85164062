use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the seen-offer store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt seen-offer file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Failures acquiring the run lock.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Run lock {path} is held by pid {pid} since {acquired_at}")]
    Held {
        path: PathBuf,
        pid: u32,
        acquired_at: String,
    },

    #[error("Lock file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
