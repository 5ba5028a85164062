use crate::config::SourceConfig;
use common::JobOffer;

/// Keeps offers whose title mentions one of the wanted job titles and
/// whose location (or description) mentions the wanted location.
///
/// Matching is case-insensitive substring matching. No titles means any
/// title matches; an empty location disables the location check.
#[derive(Debug, Clone)]
pub struct OfferFilter {
    titles: Vec<String>,
    location: String,
}

impl OfferFilter {
    pub fn new<I, S>(titles: I, location: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            titles: titles
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            location: location.trim().to_lowercase(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(&config.titles, &config.location)
    }

    pub fn matches(&self, offer: &JobOffer) -> bool {
        self.matches_title(offer.title()) && self.matches_location(offer)
    }

    fn matches_title(&self, title: &str) -> bool {
        if self.titles.is_empty() {
            return true;
        }
        let title = title.to_lowercase();
        self.titles.iter().any(|wanted| title.contains(wanted.as_str()))
    }

    fn matches_location(&self, offer: &JobOffer) -> bool {
        if self.location.is_empty() {
            return true;
        }
        offer.location().to_lowercase().contains(&self.location)
            || offer.description().to_lowercase().contains(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(title: &str, location: &str, description: &str) -> JobOffer {
        JobOffer::new("test", title, "Acme", format!("https://jobs.example/{title}"))
            .unwrap()
            .with_location(location)
            .with_description(description)
    }

    #[test]
    fn test_title_and_location_must_both_match() {
        let filter = OfferFilter::new(["Data Analyst", "data scientist"], "Paris");

        assert!(filter.matches(&offer("Senior DATA ANALYST", "Paris 8e", "")));
        assert!(!filter.matches(&offer("Data Engineer", "Paris", "")));
        assert!(!filter.matches(&offer("Data Scientist", "Lyon", "")));
    }

    #[test]
    fn test_location_found_in_description() {
        let filter = OfferFilter::new(["data scientist"], "paris");
        assert!(filter.matches(&offer("Data Scientist", "France", "Poste base a Paris")));
    }

    #[test]
    fn test_empty_criteria_match_everything() {
        let filter = OfferFilter::new(Vec::<String>::new(), "");
        assert!(filter.matches(&offer("Barista", "", "")));
    }
}
