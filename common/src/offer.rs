use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single job listing as returned by an offer source.
///
/// Fields are private so an offer cannot change after the fetch that
/// produced it; sources build offers through [`JobOffer::new`] and the
/// `with_*` methods.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct JobOffer {
    id: String,
    title: String,
    company: String,
    location: String,
    description: String,
    url: String,
    posted_at: Option<DateTime<Utc>>,
    salary_min: Option<i64>,
    source: String,
}

impl JobOffer {
    /// Builds an offer, deriving its identifier from the URL (or the title
    /// when the URL is empty). Returns `None` when neither is usable.
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into().trim().to_string();
        let url = url.into().trim().to_string();
        let id = Self::identifier_for(&url, &title)?;

        Some(Self {
            id,
            title,
            company: company.into().trim().to_string(),
            location: String::new(),
            description: String::new(),
            url,
            posted_at: None,
            salary_min: None,
            source: source.into(),
        })
    }

    /// The stable identifier used for deduplication.
    pub fn identifier_for(url: &str, title: &str) -> Option<String> {
        let url = url.trim();
        if !url.is_empty() {
            return Some(url.to_string());
        }
        let title = title.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
        None
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into().trim().to_string();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_posted_at(mut self, posted_at: Option<DateTime<Utc>>) -> Self {
        self.posted_at = posted_at;
        self
    }

    pub fn with_salary_min(mut self, salary_min: Option<i64>) -> Self {
        self.salary_min = salary_min;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    pub fn salary_min(&self) -> Option<i64> {
        self.salary_min
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
