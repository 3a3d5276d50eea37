//! Fee models.
//!
//! [`SatoshisPerKilobyte`] charges a fixed rate. [`LiveFeePolicy`] asks a
//! [`FeeRateSource`] for the current rate, remembers it in a caller-owned
//! [`FeeRateCache`] for a validity window, and falls back to a configured
//! rate when the source cannot be reached.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::transaction::Transaction;
use crate::TransactionError;

/// How long a fetched rate stays usable unless configured otherwise.
pub const DEFAULT_RATE_VALIDITY: Duration = Duration::from_secs(5 * 60);

/// Computes the fee a transaction should pay.
pub trait FeeModel {
    /// The fee in satoshis for `tx` once all of its inputs are signed.
    fn compute_fee(&self, tx: &Transaction) -> impl Future<Output = Result<u64, TransactionError>> + Send;
}

/// `ceil(size * rate / 1000)`.
fn fee_for_size(size: usize, satoshis_per_kb: u64) -> u64 {
    (size as u64).saturating_mul(satoshis_per_kb).div_ceil(1000)
}

/// A fixed rate in satoshis per 1000 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SatoshisPerKilobyte {
    pub value: u64,
}

impl SatoshisPerKilobyte {
    pub fn new(value: u64) -> Self {
        SatoshisPerKilobyte { value }
    }
}

impl FeeModel for SatoshisPerKilobyte {
    async fn compute_fee(&self, tx: &Transaction) -> Result<u64, TransactionError> {
        Ok(fee_for_size(tx.estimate_size()?, self.value))
    }
}

/// Where a live fee rate comes from, usually a miner or broadcaster API.
pub trait FeeRateSource {
    /// The current rate in satoshis per 1000 bytes.
    fn fetch_rate(&self) -> impl Future<Output = Result<u64, TransactionError>> + Send;
}

/// The last fetched rate and when it was fetched.
#[derive(Clone, Debug)]
pub struct FeeRateCache {
    rate: Option<(u64, Instant)>,
    validity: Duration,
}

impl FeeRateCache {
    /// An empty cache with the default five minute window.
    pub fn new() -> Self {
        Self::with_validity(DEFAULT_RATE_VALIDITY)
    }

    pub fn with_validity(validity: Duration) -> Self {
        FeeRateCache { rate: None, validity }
    }

    /// The cached rate if it was fetched within the validity window.
    pub fn fresh_rate(&self, now: Instant) -> Option<u64> {
        self.rate
            .filter(|(_, fetched_at)| now.saturating_duration_since(*fetched_at) < self.validity)
            .map(|(rate, _)| rate)
    }

    /// The cached rate regardless of age.
    pub fn last_rate(&self) -> Option<u64> {
        self.rate.map(|(rate, _)| rate)
    }

    pub fn store(&mut self, rate: u64, fetched_at: Instant) {
        self.rate = Some((rate, fetched_at));
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }
}

impl Default for FeeRateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Charges the rate reported by a [`FeeRateSource`].
///
/// A failed fetch falls back to the last known rate, or to `fallback_rate`
/// when nothing has been fetched yet.
pub struct LiveFeePolicy<S> {
    source: S,
    cache: Mutex<FeeRateCache>,
    fallback_rate: u64,
}

impl<S: FeeRateSource + Sync> LiveFeePolicy<S> {
    /// # Arguments
    /// * `source` - Where current rates are fetched from.
    /// * `cache` - The cache to read and refresh. Pass a pre-filled cache to
    ///   start from a known rate.
    /// * `fallback_rate` - Rate in satoshis per 1000 bytes used when the
    ///   source fails and the cache is empty.
    pub fn new(source: S, cache: FeeRateCache, fallback_rate: u64) -> Self {
        LiveFeePolicy { source, cache: Mutex::new(cache), fallback_rate }
    }

    /// The rate to charge now, refreshing the cache when it has expired.
    pub async fn current_rate(&self) -> u64 {
        if let Some(rate) = self.cache().fresh_rate(Instant::now()) {
            return rate;
        }

        match self.source.fetch_rate().await {
            Ok(rate) => {
                log::debug!("refreshed fee rate: {} sat/kB", rate);
                self.cache_mut(|cache| cache.store(rate, Instant::now()));
                rate
            }
            Err(e) => {
                let rate = self.cache().last_rate().unwrap_or(self.fallback_rate);
                log::warn!("fee rate fetch failed ({}), using {} sat/kB", e, rate);
                rate
            }
        }
    }

    /// A snapshot of the cache.
    pub fn cache(&self) -> FeeRateCache {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn cache_mut(&self, f: impl FnOnce(&mut FeeRateCache)) {
        let mut guard = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

impl<S: FeeRateSource + Sync> FeeModel for LiveFeePolicy<S> {
    async fn compute_fee(&self, tx: &Transaction) -> Result<u64, TransactionError> {
        let size = tx.estimate_size()?;
        Ok(fee_for_size(size, self.current_rate().await))
    }
}
