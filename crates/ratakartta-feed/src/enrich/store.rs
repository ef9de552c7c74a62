//! Per-day trip metadata cache with a durable backing layer.
//!
//! Lookups check memory first and fall back to the durable layer, copying
//! a durable hit into memory so later lookups for the key stay in memory.
//! Writes go to memory and then to the durable layer. A key is written at
//! most once per process: later writes for a populated key are ignored.
//!
//! Durable-layer failures are logged and otherwise ignored, so the cache
//! keeps working from memory alone.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

use ratakartta_core::model::{CacheKey, TrainNumber, TripMetadata};
use ratakartta_core::schema::DurableStore;

use crate::enrich::lock_or_recover;

/// Source of the current service day.
pub trait Clock: Send + Sync + fmt::Debug {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock UTC date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Trip metadata cache keyed by train number and service day.
pub struct MetadataStore {
    memory: Mutex<HashMap<CacheKey, TripMetadata>>,
    durable: Option<Mutex<Box<dyn DurableStore>>>,
    clock: Arc<dyn Clock>,
}

impl MetadataStore {
    /// A store backed by `durable`, using the system clock.
    pub fn new(durable: impl DurableStore + 'static) -> Self {
        Self::with_clock(Some(Box::new(durable)), Arc::new(SystemClock))
    }

    /// A store without durable persistence.
    pub fn in_memory() -> Self {
        Self::with_clock(None, Arc::new(SystemClock))
    }

    pub fn with_clock(durable: Option<Box<dyn DurableStore>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            durable: durable.map(Mutex::new),
            clock,
        }
    }

    /// Cache key for `train` on the current service day.
    ///
    /// Recomputed on every call, so a lookup just after midnight targets
    /// a different key than one made a minute earlier.
    pub fn day_key(&self, train: TrainNumber) -> CacheKey {
        CacheKey::new(train, self.clock.today())
    }

    pub fn get(&self, train: TrainNumber) -> Option<TripMetadata> {
        self.get_key(&self.day_key(train))
    }

    pub fn has(&self, train: TrainNumber) -> bool {
        self.has_key(&self.day_key(train))
    }

    /// Store metadata for `train` on the current service day.
    ///
    /// Returns `false` if the key was already populated.
    pub fn set(&self, train: TrainNumber, metadata: TripMetadata) -> bool {
        self.set_key(&self.day_key(train), metadata)
    }

    pub fn get_key(&self, key: &CacheKey) -> Option<TripMetadata> {
        if let Some(found) = lock_or_recover(&self.memory).get(key) {
            return Some(found.clone());
        }

        let loaded = self.load_durable(key)?;
        let mut memory = lock_or_recover(&self.memory);
        // A concurrent set may have populated the key meanwhile; keep it.
        Some(memory.entry(*key).or_insert(loaded).clone())
    }

    pub fn has_key(&self, key: &CacheKey) -> bool {
        self.get_key(key).is_some()
    }

    /// Store metadata under an explicit key.
    ///
    /// Returns `false` (and changes nothing) if the key was already
    /// populated in memory.
    pub fn set_key(&self, key: &CacheKey, metadata: TripMetadata) -> bool {
        {
            let mut memory = lock_or_recover(&self.memory);
            if memory.contains_key(key) {
                return false;
            }
            memory.insert(*key, metadata.clone());
        }
        self.save_durable(key, &metadata);
        true
    }

    /// Whether writes are mirrored to a durable layer.
    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Number of entries currently loaded in memory.
    pub fn memory_len(&self) -> usize {
        lock_or_recover(&self.memory).len()
    }

    fn load_durable(&self, key: &CacheKey) -> Option<TripMetadata> {
        let durable = self.durable.as_ref()?;
        let raw = match lock_or_recover(durable).load(&key.to_string()) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Durable cache read failed for {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("Ignoring unreadable cached metadata for {}: {}", key, e);
                None
            }
        }
    }

    fn save_durable(&self, key: &CacheKey, metadata: &TripMetadata) {
        let Some(durable) = self.durable.as_ref() else {
            return;
        };
        let raw = match serde_json::to_string(metadata) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Could not serialize metadata for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = lock_or_recover(durable).save(&key.to_string(), &raw) {
            log::warn!(
                "Durable cache write failed for {}, keeping it in memory only: {}",
                key,
                e
            );
        }
    }
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("memory_len", &self.memory_len())
            .field("durable", &self.is_durable())
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratakartta_core::schema::Database;
    use ratakartta_core::Result as CoreResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FixedClock(Mutex<NaiveDate>);

    impl FixedClock {
        fn new(day: NaiveDate) -> Arc<Self> {
            Arc::new(Self(Mutex::new(day)))
        }

        fn set(&self, day: NaiveDate) {
            *self.0.lock().unwrap() = day;
        }
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    /// Durable layer whose every call fails.
    struct BrokenStore;

    impl DurableStore for BrokenStore {
        fn load(&self, _key: &str) -> CoreResult<Option<String>> {
            Err(storage_failure())
        }

        fn save(&self, _key: &str, _value: &str) -> CoreResult<()> {
            Err(storage_failure())
        }
    }

    fn storage_failure() -> ratakartta_core::Error {
        let parse = serde_json::from_str::<TripMetadata>("not json").unwrap_err();
        ratakartta_core::Error::Serialization(parse)
    }

    /// Database wrapper counting durable reads.
    struct CountingStore {
        db: Database,
        loads: Arc<AtomicUsize>,
    }

    impl DurableStore for CountingStore {
        fn load(&self, key: &str) -> CoreResult<Option<String>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.db.load(key)
        }

        fn save(&self, key: &str, value: &str) -> CoreResult<()> {
            self.db.save(key, value)
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn train(n: u32) -> TrainNumber {
        TrainNumber::new(n)
    }

    #[test]
    fn test_is_durable() {
        assert!(!MetadataStore::in_memory().is_durable());
        assert!(MetadataStore::new(Database::open_in_memory().unwrap()).is_durable());
    }

    #[test]
    fn test_set_then_get() {
        let store = MetadataStore::in_memory();
        assert!(!store.has(train(905)));
        assert!(store.set(train(905), TripMetadata::new("HKI", "TPE")));
        assert_eq!(store.get(train(905)), Some(TripMetadata::new("HKI", "TPE")));
        assert!(store.has(train(905)));
    }

    #[test]
    fn test_set_is_idempotent_and_first_write_wins() {
        let store = MetadataStore::in_memory();
        assert!(store.set(train(1), TripMetadata::new("A", "B")));
        assert!(!store.set(train(1), TripMetadata::new("A", "B")));
        assert!(!store.set(train(1), TripMetadata::new("X", "Y")));
        assert_eq!(store.get(train(1)), Some(TripMetadata::new("A", "B")));
        assert_eq!(store.memory_len(), 1);
    }

    #[test]
    fn test_day_key_isolation() {
        let clock = FixedClock::new(day(2024, 3, 2));
        let store = MetadataStore::with_clock(None, Arc::clone(&clock) as Arc<dyn Clock>);

        store.set(train(123), TripMetadata::new("HKI", "OL"));
        assert!(store.has(train(123)));

        clock.set(day(2024, 3, 1));
        assert_eq!(store.get(train(123)), None);

        clock.set(day(2024, 3, 3));
        assert_eq!(store.get(train(123)), None);
    }

    #[test]
    fn test_key_addressed_write_survives_day_change() {
        let clock = FixedClock::new(day(2024, 3, 1));
        let store = MetadataStore::with_clock(None, Arc::clone(&clock) as Arc<dyn Clock>);
        let key = store.day_key(train(7));

        clock.set(day(2024, 3, 2));
        store.set_key(&key, TripMetadata::new("A", "B"));

        assert_eq!(store.get(train(7)), None);
        assert_eq!(store.get_key(&key), Some(TripMetadata::new("A", "B")));
    }

    #[test]
    fn test_hydrates_from_durable_layer_once() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trip_metadata("905-2024-03-01", r#"{"origin":"HKI","dest":"TPE"}"#)
            .unwrap();
        let loads = Arc::new(AtomicUsize::new(0));
        let durable = CountingStore {
            db,
            loads: Arc::clone(&loads),
        };
        let store = MetadataStore::with_clock(
            Some(Box::new(durable)),
            FixedClock::new(day(2024, 3, 1)),
        );

        assert_eq!(store.memory_len(), 0);
        assert_eq!(store.get(train(905)), Some(TripMetadata::new("HKI", "TPE")));
        assert_eq!(store.memory_len(), 1);
        assert!(store.has(train(905)));
        assert_eq!(store.get(train(905)), Some(TripMetadata::new("HKI", "TPE")));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_is_mirrored_to_durable_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let clock = FixedClock::new(day(2024, 3, 1));

        {
            let store = MetadataStore::with_clock(
                Some(Box::new(Database::open(&path).unwrap())),
                Arc::clone(&clock) as Arc<dyn Clock>,
            );
            store.set(train(905), TripMetadata::new("HKI", "TPE"));
        }

        let reopened = MetadataStore::with_clock(
            Some(Box::new(Database::open(&path).unwrap())),
            clock,
        );
        assert_eq!(
            reopened.get(train(905)),
            Some(TripMetadata::new("HKI", "TPE"))
        );
    }

    #[test]
    fn test_broken_durable_layer_degrades_to_memory() {
        let store = MetadataStore::with_clock(
            Some(Box::new(BrokenStore)),
            FixedClock::new(day(2024, 3, 1)),
        );
        assert_eq!(store.get(train(1)), None);
        assert!(store.set(train(1), TripMetadata::new("A", "B")));
        assert_eq!(store.get(train(1)), Some(TripMetadata::new("A", "B")));
    }

    #[test]
    fn test_unreadable_durable_value_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.insert_trip_metadata("5-2024-03-01", "not json").unwrap();
        let store = MetadataStore::with_clock(Some(Box::new(db)), FixedClock::new(day(2024, 3, 1)));
        assert_eq!(store.get(train(5)), None);
    }

    #[test]
    fn test_empty_metadata_counts_as_populated() {
        let store = MetadataStore::in_memory();
        store.set(train(9), TripMetadata::default());
        assert!(store.has(train(9)));
        assert!(store.get(train(9)).unwrap().is_empty());
    }
}
