//! Display prices and download counts.
//!
//! Uploaded documents get a display price when they are registered, and the
//! marketplace shows a download count per document. Neither is backed by real
//! market data yet, so both come from a [`PricingProvider`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use medchain_types::DocumentRecord;

pub trait PricingProvider: Send + Sync {
    /// Decimal ether price for a newly uploaded file.
    fn quote(&self, filename: &str, size_bytes: u64) -> String;

    /// Download count shown for a listed document.
    fn downloads(&self, record: &DocumentRecord) -> u32;
}

/// Draws prices uniformly from a range, with three decimals.
#[derive(Debug, Clone)]
pub struct RandomPricing {
    min_milli_ether: u64,
    max_milli_ether: u64,
    max_downloads: u32,
}

impl RandomPricing {
    /// Prices between `min_milli_ether` and `max_milli_ether` (inclusive,
    /// in thousandths of an ether). Bounds are swapped if reversed.
    pub fn new(min_milli_ether: u64, max_milli_ether: u64, max_downloads: u32) -> Self {
        Self {
            min_milli_ether: min_milli_ether.min(max_milli_ether),
            max_milli_ether: min_milli_ether.max(max_milli_ether),
            max_downloads,
        }
    }
}

impl Default for RandomPricing {
    fn default() -> Self {
        Self::new(10, 200, 50)
    }
}

impl PricingProvider for RandomPricing {
    fn quote(&self, _filename: &str, _size_bytes: u64) -> String {
        let milli = rand::thread_rng().gen_range(self.min_milli_ether..=self.max_milli_ether);
        format_milli_ether(milli)
    }

    /// Stable per storage hash so repeated listings agree.
    fn downloads(&self, record: &DocumentRecord) -> u32 {
        let mut hasher = DefaultHasher::new();
        record.storage_hash.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        rng.gen_range(0..=self.max_downloads)
    }
}

/// Fixed values, for tests and deterministic deployments.
#[derive(Debug, Clone)]
pub struct FixedPricing {
    pub price: String,
    pub downloads: u32,
}

impl FixedPricing {
    pub fn new(price: impl Into<String>, downloads: u32) -> Self {
        Self {
            price: price.into(),
            downloads,
        }
    }
}

impl PricingProvider for FixedPricing {
    fn quote(&self, _filename: &str, _size_bytes: u64) -> String {
        self.price.clone()
    }

    fn downloads(&self, _record: &DocumentRecord) -> u32 {
        self.downloads
    }
}

fn format_milli_ether(milli: u64) -> String {
    format!("{}.{:03}", milli / 1000, milli % 1000)
}
