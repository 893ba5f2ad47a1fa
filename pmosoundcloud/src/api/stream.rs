//! Résolution de la source d'une piste en URL CDN
//!
//! La référence de flux du catalogue répond par une redirection vers une
//! URL signée à durée de vie courte. La redirection n'est pas suivie : seul
//! l'en-tête `Location` est lu, le corps n'est pas téléchargé.

use super::SoundCloudApi;
use crate::error::{Result, SoundCloudError};
use crate::models::{PlayMethod, TrackRecord};
use reqwest::header::LOCATION;
use tracing::{debug, warn};

/// Référence à sonder pour une piste
///
/// Le téléchargement n'est retenu que si la méthode est `download`, qu'une
/// URL de téléchargement existe et que la piste est téléchargeable.
pub fn select_source(record: &TrackRecord, mode: PlayMethod) -> Option<&str> {
    let download = record
        .download_url
        .as_deref()
        .filter(|url| !url.is_empty());

    match download {
        Some(url) if mode == PlayMethod::Download && record.downloadable => Some(url),
        _ => record.stream_url.as_deref().filter(|url| !url.is_empty()),
    }
}

impl SoundCloudApi {
    /// Sonde la référence choisie et retourne l'URL de redirection
    pub async fn resolve_stream_url(
        &self,
        record: &TrackRecord,
        mode: PlayMethod,
        api_key: &str,
    ) -> Result<String> {
        let source = select_source(record, mode)
            .ok_or_else(|| SoundCloudError::stream_resolution("no stream reference", ""))?;

        debug!(track_id = %record.id, source = %source, "Probing stream redirect");

        let response = Self::authorize(self.probe_client.get(source), api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(track_id = %record.id, "Redirect probe failed: {}", e);
                SoundCloudError::TransportFailure(e.to_string())
            })?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        match location {
            Some(url) => {
                debug!(track_id = %record.id, "Stream redirect captured");
                Ok(url)
            }
            None => {
                let status = response.status().to_string();
                let body = response.text().await.unwrap_or_default();
                warn!(track_id = %record.id, status = %status, "No Location header in redirect");
                Err(SoundCloudError::stream_resolution(status, &body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(download_url: Option<&str>, downloadable: bool) -> TrackRecord {
        TrackRecord {
            id: "1".to_string(),
            stream_url: Some("https://api/stream".to_string()),
            download_url: download_url.map(str::to_string),
            downloadable,
            ..Default::default()
        }
    }

    #[test]
    fn test_download_requires_all_three_conditions() {
        let eligible = record(Some("https://api/download"), true);
        assert_eq!(
            select_source(&eligible, PlayMethod::Download),
            Some("https://api/download")
        );
        assert_eq!(
            select_source(&eligible, PlayMethod::Stream),
            Some("https://api/stream")
        );

        let not_downloadable = record(Some("https://api/download"), false);
        assert_eq!(
            select_source(&not_downloadable, PlayMethod::Download),
            Some("https://api/stream")
        );

        let empty_url = record(Some(""), true);
        assert_eq!(
            select_source(&empty_url, PlayMethod::Download),
            Some("https://api/stream")
        );

        let missing_url = record(None, true);
        assert_eq!(
            select_source(&missing_url, PlayMethod::Download),
            Some("https://api/stream")
        );
    }

    #[test]
    fn test_missing_stream_reference() {
        let record = TrackRecord {
            id: "1".to_string(),
            ..Default::default()
        };
        assert_eq!(select_source(&record, PlayMethod::Stream), None);
    }
}
