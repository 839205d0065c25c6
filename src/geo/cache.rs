//! Session-lifetime geolocation cache
//!
//! Every IP is resolved at most once per process. Local addresses and failed
//! lookups get a synthetic record that is cached like a real one, so a point
//! stays put for the rest of the session and failures are not retried.

use cached::{Cached, UnboundCache};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{is_local_address, GeoLookup, GeoRecord, LOCAL_CITY, LOCAL_COUNTRY, UNKNOWN_PLACE};

pub struct GeoCache {
    lookup: Arc<dyn GeoLookup>,
    entries: Mutex<UnboundCache<String, GeoRecord>>,
    rng: Mutex<StdRng>,
}

/// Cache counters for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GeoCache {
    /// `seed` pins synthetic coordinates; `None` draws from OS entropy
    pub fn new(lookup: Arc<dyn GeoLookup>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            lookup,
            entries: Mutex::new(UnboundCache::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Resolve `ip` to a location. Never fails.
    pub async fn resolve(&self, ip: &str) -> GeoRecord {
        let hit = lock(&self.entries).cache_get(ip).cloned();
        if let Some(hit) = hit {
            return hit;
        }

        let record = if is_local_address(ip) {
            self.synthetic(LOCAL_COUNTRY, LOCAL_CITY)
        } else {
            match self.lookup.lookup(ip).await {
                Ok(record) if record.has_valid_coordinates() => record,
                Ok(record) => {
                    warn!(
                        "Geolocation for {} out of range ({}, {}), using fallback",
                        ip, record.latitude, record.longitude
                    );
                    self.synthetic(UNKNOWN_PLACE, UNKNOWN_PLACE)
                }
                Err(e) => {
                    debug!("Geolocation lookup for {} failed: {}", ip, e);
                    self.synthetic(UNKNOWN_PLACE, UNKNOWN_PLACE)
                }
            }
        };

        // The miss was already counted above, so store without another lookup.
        // A concurrent resolve may have stored this IP first; that record wins.
        let mut entries = lock(&self.entries);
        match entries.cache_set(ip.to_string(), record.clone()) {
            Some(previous) => {
                entries.cache_set(ip.to_string(), previous.clone());
                previous
            }
            None => record,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = lock(&self.entries);
        CacheStats {
            entries: entries.cache_size(),
            hits: entries.cache_hits().unwrap_or(0),
            misses: entries.cache_misses().unwrap_or(0),
        }
    }

    fn synthetic(&self, country: &str, city: &str) -> GeoRecord {
        let mut rng = lock(&self.rng);
        GeoRecord {
            latitude: rng.gen_range(-90.0..=90.0),
            longitude: rng.gen_range(-180.0..=180.0),
            country_name: country.to_string(),
            city: city.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoLookupError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every lookup with a fixed record and counts calls
    struct CountingLookup {
        calls: AtomicUsize,
        record: GeoRecord,
    }

    impl CountingLookup {
        fn new(latitude: f64, longitude: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                record: GeoRecord {
                    latitude,
                    longitude,
                    country_name: "United States".to_string(),
                    city: "Mountain View".to_string(),
                },
            }
        }
    }

    #[async_trait]
    impl GeoLookup for CountingLookup {
        async fn lookup(&self, _ip: &str) -> Result<GeoRecord, GeoLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.clone())
        }
    }

    struct FailingLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoLookup for FailingLookup {
        async fn lookup(&self, ip: &str) -> Result<GeoRecord, GeoLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GeoLookupError::NotFound(ip.to_string()))
        }
    }

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let lookup = Arc::new(CountingLookup::new(37.386, -122.0838));
        let cache = GeoCache::new(lookup.clone(), Some(1));

        let first = cache.resolve("8.8.8.8").await;
        let second = cache.resolve("8.8.8.8").await;

        assert_eq!(first, second);
        assert_eq!(first.country_name, "United States");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().entries, 1);
        assert!(cache.stats().hits >= 1);
    }

    #[tokio::test]
    async fn each_new_ip_counts_one_miss() {
        let lookup = Arc::new(CountingLookup::new(37.386, -122.0838));
        let cache = GeoCache::new(lookup, Some(1));

        cache.resolve("8.8.8.8").await;
        cache.resolve("1.1.1.1").await;
        cache.resolve("192.168.0.7").await;
        cache.resolve("8.8.8.8").await;

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 3,
                hits: 1,
                misses: 3,
            }
        );
    }

    #[tokio::test]
    async fn local_address_is_synthesized_and_stable() {
        let lookup = Arc::new(CountingLookup::new(0.0, 0.0));
        let cache = GeoCache::new(lookup.clone(), Some(42));

        let first = cache.resolve("192.168.1.5").await;
        let second = cache.resolve("192.168.1.5").await;

        assert_eq!(first.country_name, LOCAL_COUNTRY);
        assert_eq!(first.city, LOCAL_CITY);
        assert_eq!(first.latitude, second.latitude);
        assert_eq!(first.longitude, second.longitude);
        assert!(first.has_valid_coordinates());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_lookup_is_cached_as_unknown() {
        let lookup = Arc::new(FailingLookup {
            calls: AtomicUsize::new(0),
        });
        let cache = GeoCache::new(lookup.clone(), Some(3));

        let first = cache.resolve("203.0.113.9").await;
        let second = cache.resolve("203.0.113.9").await;

        assert_eq!(first.country_name, UNKNOWN_PLACE);
        assert_eq!(first.city, UNKNOWN_PLACE);
        assert_eq!(first, second);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn out_of_range_coordinates_fall_back() {
        let lookup = Arc::new(CountingLookup::new(123.0, 10.0));
        let cache = GeoCache::new(lookup, Some(5));

        let record = cache.resolve("8.8.4.4").await;
        assert_eq!(record.country_name, UNKNOWN_PLACE);
        assert!(record.has_valid_coordinates());
    }

    #[tokio::test]
    async fn same_seed_gives_same_synthetic_points() {
        let a = GeoCache::new(Arc::new(CountingLookup::new(0.0, 0.0)), Some(9));
        let b = GeoCache::new(Arc::new(CountingLookup::new(0.0, 0.0)), Some(9));

        assert_eq!(a.resolve("10.0.0.7").await, b.resolve("10.0.0.7").await);
    }
}
