//! Module d'accès au catalogue SoundCloud (pistes, résolution d'URLs)

use super::SoundCloudApi;
use crate::error::{Result, SoundCloudError};
use crate::models::TrackRecord;
use serde_json::Value;
use tracing::debug;

impl SoundCloudApi {
    /// Récupère la description d'une piste (`GET /tracks/<id>`)
    ///
    /// La requête a son propre timeout (35 s par défaut). Aucun retry.
    pub async fn fetch_track(&self, track_id: &str, api_key: &str) -> Result<TrackRecord> {
        debug!("Fetching track {}", track_id);
        let endpoint = format!("/tracks/{}", track_id);
        let json = self
            .get_json(&endpoint, &[], api_key, Some(self.request_timeout))
            .await?;

        serde_json::from_value(json).map_err(|e| {
            debug!("Track {} has an unexpected shape: {}", track_id, e);
            SoundCloudError::CatalogFetchFailed(e.to_string())
        })
    }

    /// Résout une URL de page SoundCloud en objet du catalogue (`GET /resolve`)
    pub async fn resolve_url(&self, page_url: &str, api_key: &str) -> Result<Value> {
        debug!("Resolving page {}", page_url);
        self.get_json("/resolve", &[("url", page_url)], api_key, None)
            .await
    }
}
