//! Extension pour intégrer la configuration SoundCloud dans pmoconfig
//!
//! Le trait [`SoundCloudConfigExt`] ajoute à `pmoconfig::Config` les
//! réglages SoundCloud (`accounts.soundcloud.*`). Le trait
//! [`SettingsProvider`] expose les réglages relus à chaque résolution.

use crate::api::ClientOptions;
use crate::models::PlayMethod;
use anyhow::Result;
use pmoconfig::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const API_KEY: &[&str] = &["accounts", "soundcloud", "api_key"];
const PLAYMETHOD: &[&str] = &["accounts", "soundcloud", "playmethod"];
const CATALOG_URL: &[&str] = &["accounts", "soundcloud", "catalog_url"];
const INSECURE_TLS: &[&str] = &["accounts", "soundcloud", "insecure_tls"];
const REQUEST_TIMEOUT: &[&str] = &["accounts", "soundcloud", "request_timeout_secs"];
const TRANSPORT_TIMEOUT: &[&str] = &["accounts", "soundcloud", "transport_timeout_secs"];
const CACHE_DIR: &[&str] = &["host", "soundcloud_cache", "directory"];

/// URL par défaut de l'API catalogue
pub const DEFAULT_CATALOG_URL: &str = "https://api.soundcloud.com";
/// Timeout d'une requête catalogue
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(35);
/// Timeout par défaut du transport HTTP
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(15);

/// Trait d'extension pour gérer la configuration SoundCloud dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmosoundcloud::SoundCloudConfigExt;
///
/// let config = get_config();
/// config.set_soundcloud_api_key("my-key")?;
/// println!("Play method: {:?}", config.get_soundcloud_playmethod());
/// ```
pub trait SoundCloudConfigExt {
    /// Clé API (chaîne vide si non configurée)
    fn get_soundcloud_api_key(&self) -> String;

    fn set_soundcloud_api_key(&self, api_key: &str) -> Result<()>;

    /// Méthode de lecture ; une valeur inconnue retombe sur `stream`
    fn get_soundcloud_playmethod(&self) -> PlayMethod;

    fn set_soundcloud_playmethod(&self, method: PlayMethod) -> Result<()>;

    fn get_soundcloud_catalog_url(&self) -> String;

    /// Désactive la vérification des certificats TLS
    fn get_soundcloud_insecure_tls(&self) -> bool;

    fn set_soundcloud_insecure_tls(&self, insecure: bool) -> Result<()>;

    /// Options de construction des clients HTTP
    fn get_soundcloud_client_options(&self) -> ClientOptions;

    /// Répertoire du cache persistant, créé s'il n'existe pas
    fn get_soundcloud_cache_dir(&self) -> Result<String>;

    fn set_soundcloud_cache_dir(&self, directory: String) -> Result<()>;
}

impl SoundCloudConfigExt for Config {
    fn get_soundcloud_api_key(&self) -> String {
        self.get_string(API_KEY, "")
    }

    fn set_soundcloud_api_key(&self, api_key: &str) -> Result<()> {
        self.set_value_str(API_KEY, api_key)
    }

    fn get_soundcloud_playmethod(&self) -> PlayMethod {
        let raw = self.get_string(PLAYMETHOD, PlayMethod::Stream.as_str());
        raw.parse().unwrap_or_else(|_| {
            warn!("Invalid SoundCloud play method '{}', using stream", raw);
            PlayMethod::Stream
        })
    }

    fn set_soundcloud_playmethod(&self, method: PlayMethod) -> Result<()> {
        self.set_value_str(PLAYMETHOD, method.as_str())
    }

    fn get_soundcloud_catalog_url(&self) -> String {
        match self.get_string(CATALOG_URL, DEFAULT_CATALOG_URL) {
            url if url.is_empty() => DEFAULT_CATALOG_URL.to_string(),
            url => url,
        }
    }

    fn get_soundcloud_insecure_tls(&self) -> bool {
        self.get_bool(INSECURE_TLS, false)
    }

    fn set_soundcloud_insecure_tls(&self, insecure: bool) -> Result<()> {
        self.set_value(INSECURE_TLS, serde_yaml::Value::Bool(insecure))
    }

    fn get_soundcloud_client_options(&self) -> ClientOptions {
        ClientOptions {
            catalog_url: self.get_soundcloud_catalog_url(),
            insecure_tls: self.get_soundcloud_insecure_tls(),
            request_timeout: Duration::from_secs(
                self.get_u64(REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT.as_secs()),
            ),
            transport_timeout: Duration::from_secs(
                self.get_u64(TRANSPORT_TIMEOUT, DEFAULT_TRANSPORT_TIMEOUT.as_secs()),
            ),
        }
    }

    fn get_soundcloud_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(CACHE_DIR, "cache_soundcloud")
    }

    fn set_soundcloud_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(CACHE_DIR, directory)
    }
}

/// Réglages lus au début de chaque résolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundCloudSettings {
    pub api_key: String,
    pub play_method: PlayMethod,
}

impl SoundCloudSettings {
    pub fn new(api_key: impl Into<String>, play_method: PlayMethod) -> Self {
        Self {
            api_key: api_key.into(),
            play_method,
        }
    }
}

/// Source des réglages, relue à chaque résolution
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> SoundCloudSettings;
}

impl SettingsProvider for SoundCloudSettings {
    fn settings(&self) -> SoundCloudSettings {
        self.clone()
    }
}

impl SettingsProvider for Config {
    fn settings(&self) -> SoundCloudSettings {
        SoundCloudSettings {
            api_key: self.get_soundcloud_api_key(),
            play_method: self.get_soundcloud_playmethod(),
        }
    }
}

impl<T: SettingsProvider + ?Sized> SettingsProvider for Arc<T> {
    fn settings(&self) -> SoundCloudSettings {
        (**self).settings()
    }
}
