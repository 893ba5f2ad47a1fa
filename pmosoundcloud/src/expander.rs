//! Expansion des pages SoundCloud en listes de pistes
//!
//! Une URL de page (`https://soundcloud.com/artiste/titre`, set, etc.) est
//! résolue via le catalogue puis transformée en URIs `soundcloud://<id>`.

use crate::api::SoundCloudApi;
use crate::config_ext::SettingsProvider;
use crate::error::{Result, SoundCloudError};
use crate::models::TrackIdentifier;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const PAGE_HOSTS: &[&str] = &["soundcloud.com", "www.soundcloud.com", "m.soundcloud.com"];

/// Indique si l'URL désigne une page du site SoundCloud
pub fn is_page_url(url: &str) -> bool {
    let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    else {
        return false;
    };

    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    PAGE_HOSTS.contains(&host.as_str())
}

/// Capacité d'expansion d'une page en URIs de lecture
#[async_trait]
pub trait PlaylistExpander: Send + Sync {
    async fn expand(&self, page_url: &str) -> Result<Vec<String>>;
}

/// Expansion via l'endpoint `/resolve` du catalogue
pub struct CatalogPlaylistExpander {
    api: Arc<SoundCloudApi>,
    settings: Arc<dyn SettingsProvider>,
}

impl CatalogPlaylistExpander {
    pub fn new(api: Arc<SoundCloudApi>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { api, settings }
    }
}

#[async_trait]
impl PlaylistExpander for CatalogPlaylistExpander {
    async fn expand(&self, page_url: &str) -> Result<Vec<String>> {
        let settings = self.settings.settings();
        let resolved = self
            .api
            .resolve_url(page_url, &settings.api_key)
            .await
            .map_err(|e| SoundCloudError::Expansion(e.detail()))?;

        let uris = track_uris(&resolved)?;
        debug!("Expanded {} into {} tracks", page_url, uris.len());
        Ok(uris)
    }
}

/// URIs de lecture d'un objet renvoyé par `/resolve`
pub fn track_uris(resolved: &Value) -> Result<Vec<String>> {
    let kind = resolved.get("kind").and_then(Value::as_str).unwrap_or("");

    match kind {
        "track" => Ok(vec![object_uri(resolved)?]),
        _ => {
            let Some(tracks) = resolved.get("tracks").and_then(Value::as_array) else {
                return Err(SoundCloudError::Expansion(format!(
                    "unsupported resource kind '{}'",
                    kind
                )));
            };

            Ok(tracks
                .iter()
                .filter_map(|track| match object_uri(track) {
                    Ok(uri) => Some(uri),
                    Err(e) => {
                        warn!("Skipping playlist entry: {}", e);
                        None
                    }
                })
                .collect())
        }
    }
}

fn object_uri(object: &Value) -> Result<String> {
    let id = match object.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return Err(SoundCloudError::Expansion("entry without id".to_string())),
    };
    Ok(TrackIdentifier::new(id)?.uri())
}
