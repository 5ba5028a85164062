//! One notifier run: load seen offers, fetch, deduplicate, notify, persist.

use crate::filter::OfferFilter;
use crate::notify::Notifier;
use crate::source::{FetchError, OfferSource};
use common::{JobOffer, SeenStore, StoreError};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Failures that abort a run. Notification failures never do.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to fetch offers: {0}")]
    Fetch(#[from] FetchError),

    #[error("Seen-offer storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Offers returned by the source.
    pub fetched: usize,
    /// Offers left after the title/location filter.
    pub matched: usize,
    /// Matched offers not seen in any earlier run.
    pub new: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct RecurringNotifier<'a> {
    source: &'a dyn OfferSource,
    notifier: &'a dyn Notifier,
    store: &'a dyn SeenStore,
    filter: OfferFilter,
}

impl<'a> RecurringNotifier<'a> {
    pub fn new(
        source: &'a dyn OfferSource,
        notifier: &'a dyn Notifier,
        store: &'a dyn SeenStore,
        filter: OfferFilter,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            filter,
        }
    }

    /// Runs once.
    ///
    /// A failed fetch returns before anything is written, so the seen set
    /// stays exactly as it was. An offer whose notification fails is still
    /// marked seen: a broken channel must not turn into a resend of every
    /// offer on each trigger.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub fn run(&self) -> Result<RunReport, RunError> {
        let mut seen = self.store.load()?;
        info!(count = seen.len(), "Loaded seen offers");

        let offers = self.source.fetch().map_err(|e| {
            error!(error = %e, "Fetching offers failed, seen offers left untouched");
            e
        })?;

        let mut report = RunReport {
            fetched: offers.len(),
            ..RunReport::default()
        };

        let matched: Vec<JobOffer> = offers
            .into_iter()
            .filter(|offer| self.filter.matches(offer))
            .collect();
        report.matched = matched.len();

        // A listing repeated within one fetch is reported once
        let mut batch_ids: HashSet<&str> = HashSet::new();
        let mut new_offers: Vec<&JobOffer> = Vec::new();
        for offer in &matched {
            if !seen.contains(offer.id()) && batch_ids.insert(offer.id()) {
                new_offers.push(offer);
            }
        }
        report.new = new_offers.len();

        info!(
            fetched = report.fetched,
            matched = report.matched,
            new = report.new,
            "Offers deduplicated"
        );

        if new_offers.is_empty() {
            info!("No new offers");
            return Ok(report);
        }

        for offer in new_offers {
            match self.notifier.notify(offer) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        offer_id = offer.id(),
                        title = offer.title(),
                        error = %e,
                        "Notification failed, offer still marked as seen"
                    );
                }
            }
            seen.add(offer.id());
        }

        self.store.persist(&seen).map_err(|e| {
            error!(error = %e, "Failed to persist seen offers");
            e
        })?;

        info!(
            sent = report.sent,
            failed = report.failed,
            seen = seen.len(),
            "Run complete"
        );
        Ok(report)
    }
}
