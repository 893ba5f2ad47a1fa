//! Structures de données pour représenter les objets SoundCloud

use crate::error::{Result, SoundCloudError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schéma des URIs de lecture internes
pub const URI_SCHEME: &str = "soundcloud://";

/// Désérialiseur flexible pour les IDs qui peuvent être des strings ou des integers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

/// Champ optionnel envoyé tantôt en nombre, tantôt en chaîne
fn deserialize_loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Entier positif absent ou `null` ramené à zéro
fn deserialize_loose_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
            .ok_or_else(|| Error::custom("expected a positive number")),
        Some(Value::String(s)) if s.is_empty() => Ok(0),
        Some(Value::String(s)) => s.parse().map_err(Error::custom),
        Some(_) => Err(Error::custom("expected a positive number")),
    }
}

/// Booléen envoyé en `true`, `1`, `"1"` ou `"true"`
fn deserialize_loose_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

/// Identifiant opaque d'une piste dans le catalogue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackIdentifier(String);

impl TrackIdentifier {
    /// Extrait l'identifiant d'une URI `soundcloud://<id>` (préfixe exact)
    pub fn parse(uri: &str) -> Result<Self> {
        match uri.strip_prefix(URI_SCHEME) {
            Some(id) if !id.is_empty() => Ok(Self(id.to_string())),
            _ => Err(SoundCloudError::InvalidUri(uri.to_string())),
        }
    }

    /// Construit un identifiant depuis un id brut du catalogue
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SoundCloudError::InvalidUri(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URI de relecture interne (`soundcloud://<id>`)
    pub fn uri(&self) -> String {
        format!("{}{}", URI_SCHEME, self.0)
    }
}

impl fmt::Display for TrackIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Méthode de lecture configurée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMethod {
    #[default]
    Stream,
    Download,
}

impl PlayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Download => "download",
        }
    }
}

impl FromStr for PlayMethod {
    type Err = SoundCloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "download" => Ok(Self::Download),
            other => Err(SoundCloudError::Configuration(format!(
                "Unknown play method '{other}'"
            ))),
        }
    }
}

/// Propriétaire d'une piste
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(default)]
    pub username: String,
}

/// Description brute d'une piste telle que renvoyée par `/tracks/<id>`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackRecord {
    /// Identifiant unique de la piste
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Durée en millisecondes
    #[serde(default, deserialize_with = "deserialize_loose_u64")]
    pub duration: u64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// Horodatage de création, ex: `2015/06/01 12:00:00 +0000`
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub release_year: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub bpm: Option<String>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    /// Téléchargement autorisé par le propriétaire
    #[serde(default, deserialize_with = "deserialize_loose_bool")]
    pub downloadable: bool,
}

impl TrackRecord {
    /// Nom affiché du propriétaire
    pub fn artist(&self) -> &str {
        self.user.as_ref().map(|u| u.username.as_str()).unwrap_or("")
    }
}

/// Sérialise `None` en chaîne vide pour garder un type de champ stable
mod empty_string_option {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_u32(*v),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| Error::custom("bpm must be a positive integer"))
                .and_then(|v| u32::try_from(v).map(Some).map_err(Error::custom)),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => s.parse().map(Some).map_err(Error::custom),
            Value::Null => Ok(None),
            _ => Err(Error::custom("bpm must be an integer or an empty string")),
        }
    }
}

/// Métadonnées d'affichage cachées pour une piste
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    pub id: String,
    /// Durée en secondes entières (tronquée)
    pub duration: u64,
    pub name: String,
    pub artist: String,
    pub album: String,
    /// URI de relecture `soundcloud://<id>`
    pub play: String,
    pub bitrate: String,
    #[serde(with = "empty_string_option")]
    pub bpm: Option<u32>,
    #[serde(rename = "type")]
    pub content_type: String,
    pub image: String,
    pub icon: String,
    pub cover: String,
    /// Année sur quatre chiffres, ou chaîne vide
    pub year: String,
}

/// Résultat d'une résolution réussie, remis à la continuation de succès
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    /// URL CDN signée, valable peu de temps
    pub url: String,
    pub metadata: TrackMetadata,
    pub play_method: PlayMethod,
    /// Durée non arrondie pour le lecteur, en secondes
    pub duration: f64,
}

impl ResolvedStream {
    pub fn track_id(&self) -> &str {
        &self.metadata.id
    }
}
