//! Session de lecture HTTP sur l'URL CDN résolue
//!
//! La session lit le flux MP3 par blocs. Elle n'est pas positionnable et
//! signale toute interruption au [`PlaybackController`], une seule fois,
//! pour que l'hôte passe à l'élément suivant.

use crate::error::{ErrorKind, Result, SoundCloudError};
use crate::models::ResolvedStream;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

/// Type de contenu annoncé au lecteur
pub const STREAM_CONTENT_TYPE: &str = "mp3";

/// Contrôleur de lecture de l'hôte
pub trait PlaybackController: Send + Sync {
    /// Le flux direct d'une piste a échoué
    fn direct_stream_failed(&self, track_id: &str, kind: ErrorKind, detail: &str);
}

/// Flux d'octets d'une piste résolue
pub struct StreamSession {
    track_id: String,
    url: String,
    duration: f64,
    bitrate: String,
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    controller: Arc<dyn PlaybackController>,
    failed: bool,
    bytes_read: u64,
}

impl StreamSession {
    /// Ouvre le flux ; en cas d'échec le contrôleur est notifié
    ///
    /// `client` est normalement [`SoundCloudApi::streaming_client`](crate::SoundCloudApi::streaming_client) :
    /// un délai global couperait les pistes longues.
    pub async fn open(
        resolved: &ResolvedStream,
        client: &Client,
        controller: Arc<dyn PlaybackController>,
    ) -> Result<Self> {
        debug!(track_id = %resolved.track_id(), "Opening stream session");

        let response = match client
            .get(&resolved.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(e) => {
                let detail = e.to_string();
                warn!(track_id = %resolved.track_id(), "Cannot open stream: {}", detail);
                controller.direct_stream_failed(
                    resolved.track_id(),
                    ErrorKind::DirectStreamFailed,
                    &detail,
                );
                return Err(SoundCloudError::DirectStreamFailed(detail));
            }
        };

        Ok(Self {
            track_id: resolved.track_id().to_string(),
            url: resolved.url.clone(),
            duration: resolved.duration,
            bitrate: resolved.metadata.bitrate.clone(),
            body: Some(response.bytes_stream().boxed()),
            controller,
            failed: false,
            bytes_read: 0,
        })
    }

    /// Bloc suivant, `None` en fin de flux
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };

        match body.next().await {
            Some(Ok(chunk)) => {
                self.bytes_read += chunk.len() as u64;
                Ok(Some(chunk))
            }
            Some(Err(e)) => Err(self.fail(e.to_string())),
            None => {
                debug!(track_id = %self.track_id, bytes = self.bytes_read, "Stream finished");
                self.body = None;
                Ok(None)
            }
        }
    }

    fn fail(&mut self, detail: String) -> SoundCloudError {
        self.body = None;
        if !self.failed {
            self.failed = true;
            warn!(track_id = %self.track_id, bytes = self.bytes_read, "Stream interrupted: {}", detail);
            self.controller
                .direct_stream_failed(&self.track_id, ErrorKind::DirectStreamFailed, &detail);
        }
        SoundCloudError::DirectStreamFailed(detail)
    }

    pub fn can_seek(&self) -> bool {
        false
    }

    pub fn is_remote(&self) -> bool {
        true
    }

    pub fn content_type(&self) -> &'static str {
        STREAM_CONTENT_TYPE
    }

    /// Durée exacte en secondes
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn bitrate(&self) -> &str {
        &self.bitrate
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
