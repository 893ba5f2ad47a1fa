//! Pipeline de résolution d'une piste SoundCloud
//!
//! Une résolution enchaîne trois étapes, sans retour arrière :
//!
//! ```text
//! Idle -> FetchingMetadata -> ResolvingStream -> CachingMetadata -> Ready
//!               |                   |
//!               +-------------------+--> Failed(kind)
//! ```
//!
//! Chaque résolution est indépendante et lit les réglages au démarrage.
//! L'échec du cache n'interrompt jamais la résolution.

use crate::api::SoundCloudApi;
use crate::cache::MetadataCache;
use crate::config_ext::{SettingsProvider, SoundCloudConfigExt};
use crate::error::{ErrorKind, Result, SoundCloudError};
use crate::expander::{is_page_url, CatalogPlaylistExpander, PlaylistExpander};
use crate::inflight::InflightRegistry;
use crate::metadata::{make_metadata, placeholder_metadata, player_duration};
use crate::models::{ResolvedStream, TrackIdentifier, TrackMetadata};
use pmoconfig::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Étape courante d'une résolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    FetchingMetadata,
    ResolvingStream,
    CachingMetadata,
    Ready,
    Failed(ErrorKind),
}

/// Suivi d'une résolution en cours
struct Resolution<'a> {
    track_id: &'a TrackIdentifier,
    state: ResolutionState,
}

impl<'a> Resolution<'a> {
    fn new(track_id: &'a TrackIdentifier) -> Self {
        Self {
            track_id,
            state: ResolutionState::Idle,
        }
    }

    fn advance(&mut self, next: ResolutionState) {
        debug!(track_id = %self.track_id, from = ?self.state, to = ?next, "Resolution state");
        self.state = next;
    }

    fn fail(&mut self, error: SoundCloudError) -> SoundCloudError {
        warn!(
            track_id = %self.track_id,
            state = ?self.state,
            kind = %error.kind(),
            "Resolution failed: {}",
            error.detail()
        );
        self.advance(ResolutionState::Failed(error.kind()));
        error
    }
}

/// Résolveur de pistes `soundcloud://<id>`
#[derive(Clone)]
pub struct TrackResolver {
    api: Arc<SoundCloudApi>,
    cache: MetadataCache,
    settings: Arc<dyn SettingsProvider>,
    inflight: InflightRegistry<TrackIdentifier, TrackMetadata>,
    expander: Arc<dyn PlaylistExpander>,
}

impl TrackResolver {
    /// Crée un résolveur ; l'expansion des pages passe par le catalogue
    pub fn new(
        api: Arc<SoundCloudApi>,
        cache: MetadataCache,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        let expander = Arc::new(CatalogPlaylistExpander::new(api.clone(), settings.clone()));
        Self {
            api,
            cache,
            settings,
            inflight: InflightRegistry::new(),
            expander,
        }
    }

    /// Construit un résolveur depuis la configuration PMOMusic
    ///
    /// Les réglages (clé API, méthode de lecture) restent liés à `config` et
    /// sont relus à chaque résolution.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let api = Arc::new(SoundCloudApi::new(config.get_soundcloud_client_options())?);
        let cache = Self::cache_from_config(&config);
        info!("SoundCloud resolver ready ({})", api.base_url());
        Ok(Self::new(api, cache, config))
    }

    #[cfg(feature = "disk-cache")]
    fn cache_from_config(config: &Config) -> MetadataCache {
        match crate::disk_cache::SqliteCacheStore::from_config(config) {
            Ok(store) => MetadataCache::new(Arc::new(store)),
            Err(e) => {
                warn!("Disk cache unavailable, falling back to memory: {}", e);
                MetadataCache::in_memory()
            }
        }
    }

    #[cfg(not(feature = "disk-cache"))]
    fn cache_from_config(_config: &Config) -> MetadataCache {
        MetadataCache::in_memory()
    }

    /// Remplace l'expansion des pages
    pub fn with_expander(mut self, expander: Arc<dyn PlaylistExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn api(&self) -> &Arc<SoundCloudApi> {
        &self.api
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Résout une piste en URL CDN et métadonnées
    pub async fn resolve(&self, id: &TrackIdentifier) -> Result<ResolvedStream> {
        let settings = self.settings.settings();
        let mut run = Resolution::new(id);

        run.advance(ResolutionState::FetchingMetadata);
        let record = self
            .api
            .fetch_track(id.as_str(), &settings.api_key)
            .await
            .map_err(|e| run.fail(e))?;

        run.advance(ResolutionState::ResolvingStream);
        let url = self
            .api
            .resolve_stream_url(&record, settings.play_method, &settings.api_key)
            .await
            .map_err(|e| run.fail(e))?;

        run.advance(ResolutionState::CachingMetadata);
        let metadata = make_metadata(&record);
        self.cache.put(&metadata).await;

        run.advance(ResolutionState::Ready);
        info!(track_id = %id, method = settings.play_method.as_str(), "Track resolved");

        Ok(ResolvedStream {
            url,
            metadata,
            play_method: settings.play_method,
            duration: player_duration(&record),
        })
    }

    /// Résout une URI `soundcloud://<id>`
    pub async fn resolve_uri(&self, uri: &str) -> Result<ResolvedStream> {
        let id = TrackIdentifier::parse(uri)?;
        self.resolve(&id).await
    }

    /// Résout puis appelle exactement une des deux continuations
    pub async fn resolve_with<S, E>(&self, id: &TrackIdentifier, on_success: S, on_error: E)
    where
        S: FnOnce(ResolvedStream),
        E: FnOnce(ErrorKind, String),
    {
        match self.resolve(id).await {
            Ok(resolved) => on_success(resolved),
            Err(e) => on_error(e.kind(), e.detail()),
        }
    }

    /// Lance la résolution en tâche de fond
    ///
    /// Le handle peut être ignoré ; la tâche possède ses continuations.
    pub fn spawn_resolution<S, E>(
        &self,
        id: TrackIdentifier,
        on_success: S,
        on_error: E,
    ) -> JoinHandle<()>
    where
        S: FnOnce(ResolvedStream) + Send + 'static,
        E: FnOnce(ErrorKind, String) + Send + 'static,
    {
        let resolver = self.clone();
        tokio::spawn(async move { resolver.resolve_with(&id, on_success, on_error).await })
    }

    /// Métadonnées d'affichage d'une URI
    ///
    /// Lues en cache, sinon récupérées (une seule requête par piste même
    /// en cas d'appels concurrents) puis cachées. En cas d'échec, des
    /// métadonnées de substitution sont retournées.
    pub async fn metadata_for(&self, uri: &str) -> TrackMetadata {
        let id = match TrackIdentifier::parse(uri) {
            Ok(id) => id,
            Err(e) => {
                warn!("Cannot describe {}: {}", uri, e);
                return placeholder_metadata(uri);
            }
        };

        if let Some(metadata) = self.cache.get(&id).await {
            return metadata;
        }

        let api = self.api.clone();
        let cache = self.cache.clone();
        let api_key = self.settings.settings().api_key;
        let fetch_id = id.clone();
        // Le cache est écrit avant que l'entrée quitte le registre
        let fetched = self
            .inflight
            .run(id.clone(), move || async move {
                let record = api.fetch_track(fetch_id.as_str(), &api_key).await?;
                let metadata = make_metadata(&record);
                cache.put(&metadata).await;
                Ok(metadata)
            })
            .await;

        match fetched {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(track_id = %id, kind = %e.kind(), "Metadata lookup failed: {}", e.detail());
                placeholder_metadata(uri)
            }
        }
    }

    /// Transforme une URI en liste d'URIs de pistes
    ///
    /// `soundcloud://<id>` donne la piste elle-même ; une page SoundCloud
    /// est confiée à l'expansion.
    pub async fn explode_playlist(&self, uri: &str) -> Result<Vec<String>> {
        if let Ok(id) = TrackIdentifier::parse(uri) {
            return Ok(vec![id.uri()]);
        }

        if is_page_url(uri) {
            return self.expander.expand(uri).await;
        }

        Err(SoundCloudError::InvalidUri(uri.to_string()))
    }
}
