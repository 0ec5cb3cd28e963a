//! The tracking cycle: fetch each product's current price, append it to
//! the store, and notify when a drop crosses the alert threshold.
//!
//! Fetching and delivery are collaborator concerns behind the
//! `PriceFetcher` and `DropNotifier` traits; this module only owns the
//! glue between them and the store.

use crate::price_series::{PriceStore, StoreError};
use log::{info, warn};

/// Source of current prices, typically a site-specific scraper.
pub trait PriceFetcher {
    /// Fetches the current price behind `url`. The error string is
    /// whatever diagnostic the fetcher can offer; the cycle records it
    /// and moves on.
    fn fetch_price(&self, url: &str) -> Result<f64, String>;
}

/// Delivery channel for price-drop alerts (email, chat, desktop, ...).
pub trait DropNotifier {
    /// Delivers one alert. Returns whether delivery succeeded.
    fn notify(&self, product: &str, old_price: f64, new_price: f64, url: &str) -> bool;
}

/// Tracking-cycle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Minimum percent drop (vs. the previous latest price) that
    /// triggers a notification.
    pub drop_threshold_percent: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            drop_threshold_percent: 10.0,
        }
    }
}

/// Outcome of one tracking cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleOutcome {
    /// Products the cycle attempted
    pub checked: usize,
    /// Observations successfully appended
    pub recorded: usize,
    /// Alerts the notifier confirmed as delivered
    pub alerts_delivered: usize,
    /// (product name, fetch diagnostic) for each product that failed
    pub failures: Vec<(String, String)>,
}

/// Runs the fetch → append → alert cycle over every tracked product.
pub struct Tracker<'a, S, F, N>
where
    S: PriceStore,
    F: PriceFetcher,
    N: DropNotifier,
{
    store: &'a S,
    fetcher: &'a F,
    notifier: &'a N,
    config: TrackerConfig,
}

impl<'a, S, F, N> Tracker<'a, S, F, N>
where
    S: PriceStore,
    F: PriceFetcher,
    N: DropNotifier,
{
    pub fn new(store: &'a S, fetcher: &'a F, notifier: &'a N, config: TrackerConfig) -> Self {
        Tracker {
            store,
            fetcher,
            notifier,
            config,
        }
    }

    /// One pass over every tracked product.
    ///
    /// A fetch failure is recorded in the outcome and skipped; the
    /// remaining products are still processed. Storage faults abort the
    /// cycle.
    pub fn run_cycle(&self) -> Result<CycleOutcome, StoreError> {
        let mut outcome = CycleOutcome::default();

        for product in self.store.all_products()? {
            outcome.checked += 1;

            let price = match self.fetcher.fetch_price(&product.url) {
                Ok(price) => price,
                Err(reason) => {
                    warn!("Fetch failed for '{}': {}", product.name, reason);
                    outcome.failures.push((product.name, reason));
                    continue;
                }
            };

            let previous = self.store.latest_price(&product.name)?;
            self.store
                .append_observation(&product.name, price, None, None)?;
            outcome.recorded += 1;

            if let Some(previous) = previous {
                if previous > 0.0 && price < previous {
                    let drop_percent = (previous - price) / previous * 100.0;
                    if drop_percent >= self.config.drop_threshold_percent {
                        info!(
                            "Price drop for '{}': {} -> {} ({:.1}%)",
                            product.name, previous, price, drop_percent
                        );
                        if self
                            .notifier
                            .notify(&product.name, previous, price, &product.url)
                        {
                            outcome.alerts_delivered += 1;
                        }
                    }
                }
            }
        }

        info!(
            "Cycle complete: {} checked, {} recorded, {} alerts, {} failures",
            outcome.checked,
            outcome.recorded,
            outcome.alerts_delivered,
            outcome.failures.len()
        );
        Ok(outcome)
    }
}
