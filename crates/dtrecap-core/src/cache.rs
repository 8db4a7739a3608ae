//! Date-scoped cache over the object store.
//!
//! The cache is the only state shared across concurrent pipeline runs.
//! Content is cached only for dates some run has marked active, which
//! keeps the cache bounded even though the input namespace spans the
//! full historical date range. Deactivating a date never evicts; it only
//! stops new caching and starts the date's inactivity clock.
//!
//! All failure paths degrade to "not cached, re-fetch next time"; no
//! storage error escapes a cache call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::decode::{decode_transactions, ColumnSet, TransactionRecord};
use crate::object_store::ObjectStore;
use crate::paths::{date_from_dt_key, TradingDate, DT_PREFIX};

/// Fraction of the byte budget eviction drains to, leaving headroom so
/// back-to-back inserts do not thrash.
const EVICTION_FLOOR: f64 = 0.9;

/// Tunables for the shared cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age past which an entry reads as a miss even if never evicted.
    pub ttl: Duration,
    /// Separate TTL for the DT file listing.
    pub list_ttl: Duration,
    /// Idle time after which a zero-reference date is purged.
    pub inactivity_window: Duration,
    /// Byte budget across raw and parsed entries.
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            list_ttl: Duration::from_secs(5 * 60),
            inactivity_window: Duration::from_secs(10 * 60),
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Read-only counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bytes_from_cache: u64,
    pub bytes_fetched: u64,
    pub used_bytes: u64,
    pub raw_entries: usize,
    pub parsed_entries: usize,
    pub active_dates: usize,
}

#[derive(Debug, Clone)]
struct RawEntry {
    body: Arc<String>,
    fetched_at: Instant,
    bytes: u64,
}

#[derive(Clone)]
struct ParsedEntry {
    records: Arc<Vec<TransactionRecord>>,
    fetched_at: Instant,
    /// Source content size; decoded records are charged at the size of
    /// the text they came from.
    bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct DateState {
    refs: u32,
    last_access: Instant,
}

struct CacheInner {
    raw: HashMap<String, RawEntry>,
    // Decoded records vary with the column set requested, so the same
    // path can carry one entry per decode shape.
    parsed: HashMap<(String, ColumnSet), ParsedEntry>,
    dates: HashMap<TradingDate, DateState>,
    listing: Option<(Arc<Vec<String>>, Instant)>,
    used_bytes: u64,
    hits: u64,
    misses: u64,
    bytes_from_cache: u64,
    bytes_fetched: u64,
}

impl CacheInner {
    fn new() -> Self {
        Self {
            raw: HashMap::new(),
            parsed: HashMap::new(),
            dates: HashMap::new(),
            listing: None,
            used_bytes: 0,
            hits: 0,
            misses: 0,
            bytes_from_cache: 0,
            bytes_fetched: 0,
        }
    }

    fn is_active(&self, date: TradingDate) -> bool {
        self.dates.get(&date).is_some_and(|d| d.refs > 0)
    }

    fn touch(&mut self, date: TradingDate, now: Instant) {
        if let Some(state) = self.dates.get_mut(&date) {
            state.last_access = now;
        }
    }

    /// Purge every entry of any zero-reference date idle past the window.
    fn sweep_inactive(&mut self, window: Duration, now: Instant) {
        let expired: Vec<TradingDate> = self
            .dates
            .iter()
            .filter(|(_, s)| s.refs == 0 && now.duration_since(s.last_access) > window)
            .map(|(d, _)| *d)
            .collect();
        if expired.is_empty() {
            return;
        }

        let is_expired = |key: &str| {
            date_from_dt_key(key)
                .map(|d| expired.contains(&d))
                .unwrap_or(false)
        };

        let mut freed = 0u64;
        self.raw.retain(|key, entry| {
            if is_expired(key) {
                freed += entry.bytes;
                false
            } else {
                true
            }
        });
        self.parsed.retain(|(key, _), entry| {
            if is_expired(key) {
                freed += entry.bytes;
                false
            } else {
                true
            }
        });
        self.used_bytes = self.used_bytes.saturating_sub(freed);
        for date in &expired {
            self.dates.remove(date);
        }
        debug!(dates = expired.len(), freed_bytes = freed, "swept inactive cache dates");
    }

    /// Evict until `used + incoming` fits under the eviction floor.
    /// Inactive-date entries go first, then oldest-fetched.
    fn evict_for(&mut self, incoming: u64, max_bytes: u64) {
        let floor = (max_bytes as f64 * EVICTION_FLOOR) as u64;
        let target = floor.saturating_sub(incoming.min(floor));

        // Entries ranked by (active date, fetch age).
        let mut candidates: Vec<(bool, Instant, String, Option<ColumnSet>)> = Vec::new();
        for (key, entry) in &self.raw {
            let active = date_from_dt_key(key).map(|d| self.is_active(d)).unwrap_or(false);
            candidates.push((active, entry.fetched_at, key.clone(), None));
        }
        for ((key, columns), entry) in &self.parsed {
            let active = date_from_dt_key(key).map(|d| self.is_active(d)).unwrap_or(false);
            candidates.push((active, entry.fetched_at, key.clone(), Some(*columns)));
        }
        candidates.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (_, _, key, columns) in candidates {
            if self.used_bytes <= target {
                break;
            }
            let freed = match columns {
                None => self.raw.remove(&key).map(|e| e.bytes),
                Some(columns) => self.parsed.remove(&(key, columns)).map(|e| e.bytes),
            };
            self.used_bytes = self.used_bytes.saturating_sub(freed.unwrap_or(0));
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            bytes_from_cache: self.bytes_from_cache,
            bytes_fetched: self.bytes_fetched,
            used_bytes: self.used_bytes,
            raw_entries: self.raw.len(),
            parsed_entries: self.parsed.len(),
            active_dates: self.dates.values().filter(|s| s.refs > 0).count(),
        }
    }
}

/// Shared raw/parsed content cache keyed by object path, gated on active
/// processing dates.
#[derive(Clone)]
pub struct DateScopedCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
    store: Arc<dyn ObjectStore>,
    config: CacheConfig,
}

impl DateScopedCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new())),
            store,
            config,
        }
    }

    /// Mark a date as being processed by one more run. Content for
    /// active dates is retained on fetch.
    pub async fn activate_date(&self, date: TradingDate) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        inner
            .dates
            .entry(date)
            .and_modify(|s| {
                s.refs += 1;
                s.last_access = now;
            })
            .or_insert(DateState {
                refs: 1,
                last_access: now,
            });
    }

    /// Release one run's hold on a date. Entries stay until the
    /// inactivity window elapses or eviction needs the space.
    pub async fn deactivate_date(&self, date: TradingDate) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        if let Some(state) = inner.dates.get_mut(&date) {
            state.refs = state.refs.saturating_sub(1);
            state.last_access = now;
        }
    }

    /// Fetch-or-reuse the raw body of an object.
    ///
    /// `None` covers both "object does not exist" and "store failed";
    /// the caller treats either as nothing to process yet.
    pub async fn raw_content(&self, key: &str) -> Option<Arc<String>> {
        {
            let mut inner = self.inner.write().await;
            let now = Instant::now();
            match inner.raw.get(key) {
                Some(entry) if now.duration_since(entry.fetched_at) < self.config.ttl => {
                    let body = Arc::clone(&entry.body);
                    let bytes = entry.bytes;
                    inner.hits += 1;
                    inner.bytes_from_cache += bytes;
                    if let Ok(date) = date_from_dt_key(key) {
                        inner.touch(date, now);
                    }
                    return Some(body);
                }
                Some(_) => {
                    // Cold entry: drop it and fall through to a re-fetch.
                    if let Some(old) = inner.raw.remove(key) {
                        inner.used_bytes = inner.used_bytes.saturating_sub(old.bytes);
                    }
                    inner.misses += 1;
                }
                None => inner.misses += 1,
            }
        }

        let body = match self.store.get(key).await {
            Ok(Some(body)) => body,
            Ok(None) => return None,
            Err(error) => {
                debug!(key, %error, "raw fetch failed, treating as absent");
                return None;
            }
        };

        let bytes = body.len() as u64;
        let body = Arc::new(body);
        let mut inner = self.inner.write().await;
        inner.bytes_fetched += bytes;

        if let Ok(date) = date_from_dt_key(key) {
            if inner.is_active(date) {
                let now = Instant::now();
                inner.sweep_inactive(self.config.inactivity_window, now);
                if inner.used_bytes + bytes > self.config.max_bytes {
                    inner.evict_for(bytes, self.config.max_bytes);
                }
                inner.raw.insert(
                    key.to_string(),
                    RawEntry {
                        body: Arc::clone(&body),
                        fetched_at: now,
                        bytes,
                    },
                );
                inner.used_bytes += bytes;
                inner.touch(date, now);
            }
        }
        Some(body)
    }

    /// Fetch-or-reuse decoded records, layering the same active/TTL
    /// policy over [`Self::raw_content`]. Entries are keyed by path and
    /// column set, so two families needing different decode shapes of
    /// the same file never see each other's records.
    pub async fn parsed(
        &self,
        key: &str,
        columns: ColumnSet,
    ) -> Option<Arc<Vec<TransactionRecord>>> {
        let cache_key = (key.to_string(), columns);
        {
            let mut inner = self.inner.write().await;
            let now = Instant::now();
            if let Some(entry) = inner.parsed.get(&cache_key) {
                if now.duration_since(entry.fetched_at) < self.config.ttl {
                    let records = Arc::clone(&entry.records);
                    let bytes = entry.bytes;
                    inner.hits += 1;
                    inner.bytes_from_cache += bytes;
                    if let Ok(date) = date_from_dt_key(key) {
                        inner.touch(date, now);
                    }
                    return Some(records);
                }
                if let Some(old) = inner.parsed.remove(&cache_key) {
                    inner.used_bytes = inner.used_bytes.saturating_sub(old.bytes);
                }
            }
        }

        let body = self.raw_content(key).await?;
        let records = Arc::new(decode_transactions(&body, columns));
        let bytes = body.len() as u64;

        let mut inner = self.inner.write().await;
        if let Ok(date) = date_from_dt_key(key) {
            if inner.is_active(date) {
                let now = Instant::now();
                inner.sweep_inactive(self.config.inactivity_window, now);
                if inner.used_bytes + bytes > self.config.max_bytes {
                    inner.evict_for(bytes, self.config.max_bytes);
                }
                inner.parsed.insert(
                    cache_key,
                    ParsedEntry {
                        records: Arc::clone(&records),
                        fetched_at: now,
                        bytes,
                    },
                );
                inner.used_bytes += bytes;
                inner.touch(date, now);
            }
        }
        Some(records)
    }

    /// List all DT input files, newest embedded date first. The listing
    /// is cached on its own TTL, independent of active-date state.
    pub async fn dt_file_list(&self) -> Arc<Vec<String>> {
        {
            let inner = self.inner.read().await;
            if let Some((listing, fetched_at)) = &inner.listing {
                if Instant::now().duration_since(*fetched_at) < self.config.list_ttl {
                    return Arc::clone(listing);
                }
            }
        }

        let keys = match self.store.list(DT_PREFIX, None).await {
            Ok(keys) => keys,
            Err(error) => {
                debug!(%error, "DT listing failed, returning empty listing");
                return Arc::new(Vec::new());
            }
        };

        let mut dated: Vec<(TradingDate, String)> = keys
            .into_iter()
            .filter_map(|key| date_from_dt_key(&key).ok().map(|date| (date, key)))
            .collect();
        dated.sort_by(|a, b| b.0.cmp(&a.0));
        let listing = Arc::new(dated.into_iter().map(|(_, key)| key).collect::<Vec<_>>());

        let mut inner = self.inner.write().await;
        inner.listing = Some((Arc::clone(&listing), Instant::now()));
        listing
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    /// Drop every entry, listing, and date registration.
    pub async fn clear_all(&self) {
        let mut inner = self.inner.write().await;
        inner.raw.clear();
        inner.parsed.clear();
        inner.dates.clear();
        inner.listing = None;
        inner.used_bytes = 0;
    }
}
