//! Cache des métadonnées de pistes SoundCloud
//!
//! Le cache associe `sc:track-<id>` à la [`TrackMetadata`] projetée, dans
//! l'espace de noms `squeezecloud`, pour 30 jours. Le stockage est
//! interchangeable via [`CacheStore`] :
//! - [`MemoryCacheStore`] : cache moka en mémoire (par défaut)
//! - `SqliteCacheStore` : cache persistant (feature `disk-cache`)
//!
//! Le cache est best-effort : une erreur de stockage est journalisée et
//! n'interrompt jamais la résolution.

use crate::error::{Result, SoundCloudError};
use crate::models::{TrackIdentifier, TrackMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Espace de noms du cache
pub const CACHE_NAMESPACE: &str = "squeezecloud";

/// Durée de vie des métadonnées (30 jours)
pub const METADATA_TTL: Duration = Duration::from_secs(2_592_000);

/// Clé de cache d'une piste
pub fn track_key(id: &TrackIdentifier) -> String {
    format!("sc:track-{}", id)
}

/// Source de temps, remplaçable dans les tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Horloge système
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Horloge avancée manuellement
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = add_saturating(*now, by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn add_saturating(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    let secs = by.as_secs().min(i64::MAX as u64 / 1000) as i64;
    at.checked_add_signed(chrono::Duration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Date d'expiration d'une entrée écrite maintenant
pub(crate) fn expiry(clock: &dyn Clock, ttl: Duration) -> DateTime<Utc> {
    add_saturating(clock.now(), ttl)
}

/// Stockage clé/valeur avec espaces de noms et TTL
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Valeur vivante pour la clé, `None` si absente ou expirée
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>>;

    /// Écrase la valeur de la clé
    async fn set(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn remove(&self, namespace: &str, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Stockage en mémoire basé sur moka
///
/// moka borne la capacité ; l'expiration est vérifiée à la lecture contre
/// l'horloge injectée.
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: MokaCache<String, StoredEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(10_000, Arc::new(SystemClock))
    }

    pub fn with_clock(max_capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: MokaCache::builder().max_capacity(max_capacity).build(),
            clock,
        }
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{}/{}", namespace, key)
    }

    /// Supprime les entrées expirées et retourne leur nombre
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_str()).await;
        }
        expired.len()
    }

    /// Nombre d'entrées (expirées comprises tant qu'elles ne sont pas purgées)
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let full_key = Self::full_key(namespace, key);
        match self.entries.get(&full_key).await {
            Some(entry) if entry.expires_at > self.clock.now() => Ok(Some(entry.value)),
            Some(_) => {
                self.entries.invalidate(&full_key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = StoredEntry {
            value,
            expires_at: expiry(self.clock.as_ref(), ttl),
        };
        self.entries
            .insert(Self::full_key(namespace, key), entry)
            .await;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.entries
            .invalidate(&Self::full_key(namespace, key))
            .await;
        Ok(())
    }
}

/// Cache des métadonnées de pistes
#[derive(Clone)]
pub struct MetadataCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: METADATA_TTL,
        }
    }

    /// Cache en mémoire avec l'horloge système
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        self.store.clone()
    }

    /// Métadonnées cachées pour la piste, `None` si absentes, expirées ou illisibles
    pub async fn get(&self, id: &TrackIdentifier) -> Option<TrackMetadata> {
        let key = track_key(id);
        let value = match self.store.get(CACHE_NAMESPACE, &key).await {
            Ok(value) => value?,
            Err(e) => {
                warn!(key = %key, error = %e, "Metadata cache read failed");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(metadata) => {
                debug!(key = %key, "Metadata found in cache");
                Some(metadata)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    /// Écrit les métadonnées (écrasement complet) ; les erreurs sont avalées
    pub async fn put(&self, metadata: &TrackMetadata) {
        if let Err(e) = self.try_put(metadata).await {
            warn!(track_id = %metadata.id, error = %e, "Metadata cache write failed");
        }
    }

    async fn try_put(&self, metadata: &TrackMetadata) -> Result<()> {
        let id = TrackIdentifier::new(metadata.id.clone())?;
        let value =
            serde_json::to_value(metadata).map_err(|e| SoundCloudError::Cache(e.to_string()))?;
        self.store
            .set(CACHE_NAMESPACE, &track_key(&id), value, self.ttl)
            .await?;
        debug!(track_id = %id, ttl_secs = self.ttl.as_secs(), "Metadata cached");
        Ok(())
    }

    pub async fn invalidate(&self, id: &TrackIdentifier) {
        if let Err(e) = self.store.remove(CACHE_NAMESPACE, &track_key(id)).await {
            warn!(track_id = %id, error = %e, "Metadata cache invalidation failed");
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::make_metadata;
    use crate::models::TrackRecord;

    fn sample_metadata(id: &str) -> TrackMetadata {
        make_metadata(&TrackRecord {
            id: id.to_string(),
            title: "Song".to_string(),
            duration: 42_000,
            ..Default::default()
        })
    }

    #[test]
    fn test_track_key() {
        let id = TrackIdentifier::new("42").unwrap();
        assert_eq!(track_key(&id), "sc:track-42");
    }

    #[tokio::test]
    async fn test_round_trip_within_ttl() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryCacheStore::with_clock(100, clock.clone()));
        let cache = MetadataCache::new(store.clone());

        let metadata = sample_metadata("42");
        cache.put(&metadata).await;

        clock.advance(METADATA_TTL - Duration::from_secs(1));

        let id = TrackIdentifier::new("42").unwrap();
        assert_eq!(cache.get(&id).await, Some(metadata.clone()));

        let raw = store.get(CACHE_NAMESPACE, "sc:track-42").await.unwrap();
        assert_eq!(raw, Some(serde_json::to_value(&metadata).unwrap()));
    }

    #[tokio::test]
    async fn test_expiry_with_manual_clock() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryCacheStore::with_clock(100, clock.clone()));
        let cache = MetadataCache::new(store.clone());

        cache.put(&sample_metadata("42")).await;
        clock.advance(METADATA_TTL);

        let id = TrackIdentifier::new("42").unwrap();
        assert_eq!(cache.get(&id).await, None);
        assert_eq!(store.get(CACHE_NAMESPACE, "sc:track-42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_is_wholesale() {
        let cache = MetadataCache::in_memory();
        let mut metadata = sample_metadata("1");
        cache.put(&metadata).await;

        metadata.name = "Renamed".to_string();
        metadata.year = "2021".to_string();
        cache.put(&metadata).await;

        let id = TrackIdentifier::new("1").unwrap();
        assert_eq!(cache.get(&id).await, Some(metadata));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryCacheStore::with_clock(100, clock.clone());

        store
            .set("ns", "short", Value::from(1), Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set("ns", "long", Value::from(2), Duration::from_secs(1000))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(60));

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.entry_count().await, 1);
        assert_eq!(store.get("ns", "long").await.unwrap(), Some(Value::from(2)));
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<Value>> {
            Err(SoundCloudError::Cache("unavailable".into()))
        }

        async fn set(&self, _: &str, _: &str, _: Value, _: Duration) -> Result<()> {
            Err(SoundCloudError::Cache("unavailable".into()))
        }

        async fn remove(&self, _: &str, _: &str) -> Result<()> {
            Err(SoundCloudError::Cache("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let cache = MetadataCache::new(Arc::new(BrokenStore));
        let id = TrackIdentifier::new("9").unwrap();

        cache.put(&sample_metadata("9")).await;
        assert_eq!(cache.get(&id).await, None);
        cache.invalidate(&id).await;
    }
}
