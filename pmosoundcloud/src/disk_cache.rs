//! Cache persistant SQLite pour les métadonnées SoundCloud
//!
//! Les métadonnées survivent ainsi aux redémarrages, pendant leurs 30 jours
//! de validité. Les appels SQLite sont exécutés via `spawn_blocking`.

use crate::cache::{expiry, CacheStore, Clock, SystemClock};
use crate::error::{Result, SoundCloudError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
    namespace  TEXT    NOT NULL,
    key        TEXT    NOT NULL,
    value      TEXT    NOT NULL,
    expires_at INTEGER NOT NULL,
    PRIMARY KEY (namespace, key)
)";

fn db_error(e: impl std::fmt::Display) -> SoundCloudError {
    SoundCloudError::Cache(e.to_string())
}

/// Stockage SQLite implémentant [`CacheStore`]
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteCacheStore {
    /// Ouvre (ou crée) la base de cache
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        info!("Opened SoundCloud cache database: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    /// Ouvre la base dans le répertoire de cache configuré
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        use crate::config_ext::SoundCloudConfigExt;

        let dir = config
            .get_soundcloud_cache_dir()
            .map_err(|e| SoundCloudError::Configuration(e.to_string()))?;
        Self::new(Path::new(&dir).join("metadata.sqlite"))
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&conn)
        })
        .await
        .map_err(db_error)?
        .map_err(db_error)
    }

    /// Supprime les entrées expirées et retourne leur nombre
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now().timestamp();
        let removed = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM cache_entries WHERE expires_at <= ?1",
                    params![now],
                )
            })
            .await?;
        debug!("Purged {} expired cache entries", removed);
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        let now = self.clock.now().timestamp();

        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT value, expires_at FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()
            })
            .await?;

        match row {
            Some((json, expires_at)) if expires_at > now => {
                serde_json::from_str(&json).map(Some).map_err(db_error)
            }
            _ => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        let json = serde_json::to_string(&value).map_err(db_error)?;
        let expires_at = expiry(self.clock.as_ref(), ttl).timestamp();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cache_entries (namespace, key, value, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![namespace, key, json, expires_at],
            )
        })
        .await?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
        })
        .await?;
        Ok(())
    }
}
