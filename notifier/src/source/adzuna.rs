//! Adzuna job search API.
//!
//! See <https://developer.adzuna.com/docs/search>. The free tier allows
//! about 1000 calls a month, so one page of at most 50 results is fetched
//! per run.

use super::{status_error, FetchError, OfferSource};
use crate::config::{AdzunaConfig, SourceConfig};
use chrono::{DateTime, Utc};
use common::JobOffer;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const SOURCE_NAME: &str = "adzuna";

/// The API refuses pages larger than this.
const MAX_RESULTS_PER_PAGE: u32 = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    title: Option<String>,
    company: Option<DisplayName>,
    location: Option<DisplayName>,
    description: Option<String>,
    redirect_url: Option<String>,
    created: Option<String>,
    salary_min: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    display_name: Option<String>,
}

pub struct AdzunaSource {
    client: Client,
    search_url: String,
    app_id: String,
    app_key: String,
    keywords: String,
    location: String,
    results_per_page: u32,
}

impl AdzunaSource {
    pub fn new(config: &AdzunaConfig, search: &SourceConfig) -> Result<Self, FetchError> {
        let (Some(app_id), Some(app_key)) = (config.app_id.clone(), config.app_key.clone()) else {
            return Err(FetchError::Unauthorized {
                source_name: SOURCE_NAME.to_string(),
            });
        };

        let search_url = format!(
            "{}/v1/api/jobs/{}/search/1",
            config.base_url.trim_end_matches('/'),
            config.country
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Http {
                url: search_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            search_url,
            app_id,
            app_key,
            keywords: search.titles.join(" OR "),
            location: search.location.clone(),
            results_per_page: config.max_results.min(MAX_RESULTS_PER_PAGE),
        })
    }
}

impl OfferSource for AdzunaSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Result<Vec<JobOffer>, FetchError> {
        info!(
            keywords = %self.keywords,
            location = %self.location,
            "Fetching jobs from Adzuna"
        );

        let results_per_page = self.results_per_page.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("what", self.keywords.as_str()),
                ("where", self.location.as_str()),
                ("results_per_page", results_per_page.as_str()),
                ("content-type", "application/json"),
            ])
            .send()
            // The request URL carries the API key; keep it out of the logs.
            .map_err(|e| FetchError::Http {
                url: self.search_url.clone(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SOURCE_NAME, &self.search_url, status));
        }

        let body = response.text().map_err(|e| FetchError::Http {
            url: self.search_url.clone(),
            reason: e.without_url().to_string(),
        })?;

        let offers = parse_results(&body, &self.location).map_err(|e| FetchError::Malformed {
            url: self.search_url.clone(),
            reason: e.to_string(),
        })?;

        info!(count = offers.len(), "Fetched offers from Adzuna");
        Ok(offers)
    }
}

/// Converts a search response body into offers. Listings without a usable
/// identifier are dropped.
fn parse_results(body: &str, default_location: &str) -> Result<Vec<JobOffer>, serde_json::Error> {
    let response: SearchResponse = serde_json::from_str(body)?;

    let mut offers = Vec::with_capacity(response.results.len());
    for job in response.results {
        let company = job
            .company
            .and_then(|c| c.display_name)
            .unwrap_or_else(|| "Unknown Company".to_string());
        let location = job
            .location
            .and_then(|l| l.display_name)
            .unwrap_or_else(|| default_location.to_string());
        let posted_at = job
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|d| d.with_timezone(&Utc));

        let Some(offer) = JobOffer::new(
            SOURCE_NAME,
            job.title.unwrap_or_default(),
            company,
            job.redirect_url.unwrap_or_default(),
        ) else {
            debug!("Skipping Adzuna listing without URL or title");
            continue;
        };

        offers.push(
            offer
                .with_location(location)
                .with_description(job.description.unwrap_or_default())
                .with_posted_at(posted_at)
                .with_salary_min(job.salary_min.map(|s| s.round() as i64)),
        );
    }

    Ok(offers)
}
