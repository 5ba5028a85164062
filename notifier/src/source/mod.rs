//! Where job offers come from.

use common::JobOffer;
use thiserror::Error;

pub mod adzuna;
pub mod weworkremotely;

pub use adzuna::AdzunaSource;
pub use weworkremotely::WeWorkRemotelySource;

/// A fetch failure. Always fatal for the current run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("{source_name} authentication failed, check the API credentials")]
    Unauthorized { source_name: String },

    #[error("{source_name} rate limit exceeded")]
    RateLimited { source_name: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// A source of job offers, queried once per run.
#[cfg_attr(test, mockall::automock)]
pub trait OfferSource {
    /// Short name used in logs and stored on each offer.
    fn name(&self) -> &'static str;

    /// Fetches the current listing. An empty list is a valid answer.
    fn fetch(&self) -> Result<Vec<JobOffer>, FetchError>;
}

/// Maps a non-success status to the matching fetch error.
pub(crate) fn status_error(source_name: &str, url: &str, status: reqwest::StatusCode) -> FetchError {
    match status.as_u16() {
        401 | 403 => FetchError::Unauthorized {
            source_name: source_name.to_string(),
        },
        429 => FetchError::RateLimited {
            source_name: source_name.to_string(),
        },
        code => FetchError::Status {
            url: url.to_string(),
            status: code,
        },
    }
}
