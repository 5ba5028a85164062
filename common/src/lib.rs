//! Shared building blocks for the job-offer notifier.
//!
//! Holds the offer model, the persisted set of already-notified offers
//! and the lock that keeps two runs from writing that set at once.

pub mod error;
pub mod lock;
pub mod offer;
pub mod seen;

pub use error::{LockError, StoreError};
pub use lock::{RunLock, RunLockGuard};
pub use offer::JobOffer;
pub use seen::{write_atomic, JsonFileStore, LinesFileStore, SeenSet, SeenStore};
