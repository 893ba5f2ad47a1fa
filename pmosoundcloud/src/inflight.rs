//! Déduplication des requêtes concurrentes
//!
//! Deux demandes simultanées pour la même clé partagent un seul appel
//! réseau. L'entrée est retirée du registre dès que l'appel se termine,
//! en succès comme en erreur.

use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tracing::debug;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Registre des récupérations en cours, par clé
pub struct InflightRegistry<K, V> {
    pending: Arc<Mutex<HashMap<K, SharedFetch<V>>>>,
}

impl<K, V> Clone for InflightRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K, V> Default for InflightRegistry<K, V> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> InflightRegistry<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Exécute `fetch` pour la clé, ou rejoint l'exécution déjà en cours
    ///
    /// `fetch` n'est appelée que si aucune récupération n'est en cours.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending.get(&key) {
                Some(existing) => {
                    debug!(key = ?key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.pending);
                    let settled_key = key.clone();
                    let fut = fetch();
                    let shared = async move {
                        let result = fut.await;
                        registry
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&settled_key);
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(key, shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Nombre de récupérations en cours
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoundCloudError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_fetch() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<u32, SoundCloudError>(7)
            }
        };

        let (a, b) = tokio::join!(
            registry.run("42".to_string(), fetch(calls.clone())),
            registry.run("42".to_string(), fetch(calls.clone())),
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = |value: u32| {
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, SoundCloudError>(value)
            }
        };

        let (a, b) = tokio::join!(
            registry.run("1".to_string(), counted(1)),
            registry.run("2".to_string(), counted(2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_removed_after_failure() {
        let registry: InflightRegistry<String, u32> = InflightRegistry::new();

        let first = registry
            .run("x".to_string(), || async {
                Err::<u32, _>(SoundCloudError::CatalogFetchFailed("boom".into()))
            })
            .await;
        assert!(first.is_err());
        assert!(registry.is_empty());

        let second = registry
            .run("x".to_string(), || async { Ok::<u32, SoundCloudError>(3) })
            .await;
        assert_eq!(second.unwrap(), 3);
    }
}
