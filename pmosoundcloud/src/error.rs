//! Gestion des erreurs pour le client SoundCloud

use thiserror::Error;

/// Type Result personnalisé pour pmosoundcloud
pub type Result<T> = std::result::Result<T, SoundCloudError>;

/// Catégorie d'erreur remontée à l'hôte
///
/// L'hôte associe chaque clé symbolique à un texte localisé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Échec réseau ou réponse non-JSON du catalogue
    CatalogFetchFailed,
    /// Le catalogue a répondu avec un message d'erreur explicite
    CatalogReportedError,
    /// La sonde de redirection n'a pas renvoyé d'en-tête `Location`
    StreamResolutionFailed,
    /// Erreur de transport pendant la sonde de redirection
    TransportFailure,
    /// Le flux audio déjà ouvert s'est interrompu
    DirectStreamFailed,
}

impl ErrorKind {
    /// Clé symbolique transmise à la continuation d'erreur
    pub fn key(&self) -> &'static str {
        match self {
            Self::CatalogFetchFailed => "PLUGIN_SQUEEZECLOUD_CATALOG_FETCH_FAILED",
            Self::CatalogReportedError => "PLUGIN_SQUEEZECLOUD_CATALOG_ERROR",
            Self::StreamResolutionFailed => "PLUGIN_SQUEEZECLOUD_STREAM_FAILED",
            Self::TransportFailure => "PLUGIN_SQUEEZECLOUD_TRANSPORT_ERROR",
            Self::DirectStreamFailed => "PLUGIN_SQUEEZECLOUD_DIRECT_STREAM_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Erreurs possibles lors de la résolution d'une piste SoundCloud
#[derive(Error, Debug, Clone)]
pub enum SoundCloudError {
    /// Transport, statut ou JSON invalide lors de l'appel au catalogue
    #[error("Catalog request failed: {0}")]
    CatalogFetchFailed(String),

    /// Le catalogue a renvoyé un champ `error`
    #[error("Catalog error: {0}")]
    CatalogReportedError(String),

    /// Pas de redirection exploitable pour la source du flux
    #[error("Stream resolution failed ({status}): {excerpt}")]
    StreamResolutionFailed { status: String, excerpt: String },

    /// Erreur bas-niveau pendant la sonde de redirection
    #[error("Transport error: {0}")]
    TransportFailure(String),

    /// Le flux direct s'est interrompu après le début de la lecture
    #[error("Stream failed: {0}")]
    DirectStreamFailed(String),

    /// URI de lecture non reconnue
    #[error("Invalid SoundCloud URI: {0}")]
    InvalidUri(String),

    /// Erreur de configuration (clé API, client HTTP, etc.)
    #[error("SoundCloud configuration error: {0}")]
    Configuration(String),

    /// Erreur du stockage de cache
    #[error("Cache error: {0}")]
    Cache(String),

    /// Échec de l'expansion d'une page en liste de pistes
    #[error("Playlist expansion failed: {0}")]
    Expansion(String),
}

impl SoundCloudError {
    /// Catégorie symbolique de l'erreur
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CatalogFetchFailed(_)
            | Self::InvalidUri(_)
            | Self::Configuration(_)
            | Self::Expansion(_)
            | Self::Cache(_) => ErrorKind::CatalogFetchFailed,
            Self::CatalogReportedError(_) => ErrorKind::CatalogReportedError,
            Self::StreamResolutionFailed { .. } => ErrorKind::StreamResolutionFailed,
            Self::TransportFailure(_) => ErrorKind::TransportFailure,
            Self::DirectStreamFailed(_) => ErrorKind::DirectStreamFailed,
        }
    }

    /// Texte libre accompagnant la clé symbolique
    pub fn detail(&self) -> String {
        match self {
            Self::CatalogFetchFailed(m)
            | Self::CatalogReportedError(m)
            | Self::TransportFailure(m)
            | Self::DirectStreamFailed(m)
            | Self::InvalidUri(m)
            | Self::Configuration(m)
            | Self::Cache(m)
            | Self::Expansion(m) => m.clone(),
            Self::StreamResolutionFailed { status, excerpt } => {
                if excerpt.is_empty() {
                    status.clone()
                } else {
                    format!("{status}: {excerpt}")
                }
            }
        }
    }

    /// Construit une erreur de résolution depuis un statut HTTP et un corps
    pub fn stream_resolution(status: impl Into<String>, body: &str) -> Self {
        Self::StreamResolutionFailed {
            status: status.into(),
            excerpt: excerpt(body),
        }
    }
}

const EXCERPT_LEN: usize = 200;

/// Premiers caractères d'un corps de réponse, pour les messages d'erreur
pub(crate) fn excerpt(body: &str) -> String {
    body.trim().chars().take(EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SoundCloudError::CatalogReportedError("x".into()).kind(),
            ErrorKind::CatalogReportedError
        );
        assert_eq!(
            SoundCloudError::stream_resolution("200 OK", "").kind(),
            ErrorKind::StreamResolutionFailed
        );
        assert_eq!(
            SoundCloudError::InvalidUri("foo".into()).kind(),
            ErrorKind::CatalogFetchFailed
        );
    }

    #[test]
    fn test_detail_includes_excerpt() {
        let err = SoundCloudError::stream_resolution("200 OK", "  hello world ");
        assert_eq!(err.detail(), "200 OK: hello world");

        let long = "a".repeat(500);
        let err = SoundCloudError::stream_resolution("500", &long);
        assert_eq!(err.detail().len(), "500: ".len() + EXCERPT_LEN);
    }

    #[test]
    fn test_keys_are_distinct() {
        let kinds = [
            ErrorKind::CatalogFetchFailed,
            ErrorKind::CatalogReportedError,
            ErrorKind::StreamResolutionFailed,
            ErrorKind::TransportFailure,
            ErrorKind::DirectStreamFailed,
        ];
        let keys: std::collections::HashSet<_> = kinds.iter().map(|k| k.key()).collect();
        assert_eq!(keys.len(), kinds.len());
    }
}
