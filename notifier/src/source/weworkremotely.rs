//! WeWorkRemotely category pages, scraped with CSS selectors.

use super::{status_error, FetchError, OfferSource};
use crate::config::WeWorkRemotelyConfig;
use common::JobOffer;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

const SOURCE_NAME: &str = "weworkremotely";

/// Extracts the minimum salary from a raw salary string using regex.
/// Looks for numbers and returns the first one found (likely the minimum).
fn extract_salary(salary_raw: &str) -> Option<i64> {
    // Comma-grouped numbers ("50,000") first, then plain digit runs ("50000")
    let re = Regex::new(r"\$?(\d{1,3}(?:,\d{3})+|\d+)").ok()?;

    for cap in re.captures_iter(salary_raw) {
        if let Some(matched) = cap.get(1) {
            let clean_number: String = matched
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            if let Ok(num) = clean_number.parse::<i64>() {
                // Smaller numbers are days posted, counts, etc.
                if num >= 1000 {
                    return Some(num);
                }
            }
        }
    }
    None
}

struct ListingSelectors {
    job: Selector,
    title: Selector,
    company: Selector,
    region: Selector,
    link: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self, FetchError> {
        Ok(Self {
            job: selector("li.feature, .new-listing-container")?,
            title: selector(".new-listing__header__title")?,
            company: selector(".new-listing__company-name")?,
            region: selector(".new-listing__company-headquarters")?,
            link: selector(".listing-link--unlocked, ._blank")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Malformed {
        url: css.to_string(),
        reason: format!("invalid selector: {:?}", e),
    })
}

fn first_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

pub struct WeWorkRemotelySource {
    client: Client,
    urls: Vec<String>,
    selectors: ListingSelectors,
}

impl WeWorkRemotelySource {
    pub fn new(config: &WeWorkRemotelyConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Http {
                url: config.urls.join(", "),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            urls: config.urls.clone(),
            selectors: ListingSelectors::new()?,
        })
    }

    fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let http_err = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(SOURCE_NAME, url, status));
        }
        response.text().map_err(http_err)
    }

    /// Parses one category page. Listings without a title are dropped.
    fn parse_page(&self, html: &str, page_url: &str) -> Result<Vec<JobOffer>, FetchError> {
        let base = Url::parse(page_url).map_err(|e| FetchError::Malformed {
            url: page_url.to_string(),
            reason: e.to_string(),
        })?;
        let document = Html::parse_document(html);
        let s = &self.selectors;

        let mut offers = Vec::new();
        for element in document.select(&s.job) {
            let Some(title) = first_text(&element, &s.title) else {
                continue;
            };
            let company =
                first_text(&element, &s.company).unwrap_or_else(|| "Unknown Company".to_string());
            let location = first_text(&element, &s.region).unwrap_or_else(|| "Remote".to_string());

            let job_url = element
                .select(&s.link)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| base.join(href).ok())
                .map(|url| url.to_string())
                .unwrap_or_default();

            // Full listing text doubles as description and salary source
            let full_text = element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let salary_min = extract_salary(&full_text);

            if let Some(offer) = JobOffer::new(SOURCE_NAME, title, company, job_url) {
                debug!(title = offer.title(), company = offer.company(), "Found listing");
                offers.push(
                    offer
                        .with_location(location)
                        .with_description(full_text)
                        .with_salary_min(salary_min),
                );
            }
        }

        Ok(offers)
    }
}

impl OfferSource for WeWorkRemotelySource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Result<Vec<JobOffer>, FetchError> {
        let mut offers = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for url in &self.urls {
            info!(url = %url, "Fetching jobs");
            let html = self.fetch_page(url)?;
            debug!(url = %url, bytes = html.len(), "Fetched page");

            // The same job may appear on multiple category pages
            for offer in self.parse_page(&html, url)? {
                if seen_ids.insert(offer.id().to_string()) {
                    offers.push(offer);
                }
            }
        }

        info!(count = offers.len(), "Fetched unique offers from WeWorkRemotely");
        Ok(offers)
    }
}
