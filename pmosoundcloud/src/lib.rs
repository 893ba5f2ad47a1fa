//! # pmosoundcloud - Résolution de pistes SoundCloud pour PMOMusic
//!
//! Cette crate transforme une demande de lecture `soundcloud://<id>` en URL
//! CDN signée que le lecteur peut ouvrir comme flux d'octets, et cache les
//! métadonnées d'affichage de la piste.
//!
//! ## Vue d'ensemble
//!
//! La résolution se fait en deux appels réseau :
//! - lecture de la piste dans le catalogue (`/tracks/<id>`)
//! - sonde de la référence de flux sans suivre la redirection, pour
//!   capturer l'URL CDN dans l'en-tête `Location`
//!
//! Les métadonnées projetées sont ensuite cachées 30 jours. Toute erreur est
//! remontée avec une clé symbolique (`PLUGIN_SQUEEZECLOUD_*`) que l'hôte
//! traduit.
//!
//! ## Structure des modules
//!
//! ```text
//! pmosoundcloud/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── resolver.rs         # Pipeline de résolution
//! │   ├── models.rs           # Structures de données
//! │   ├── metadata.rs         # Projection des métadonnées
//! │   ├── api/
//! │   │   ├── mod.rs          # Clients HTTP
//! │   │   ├── catalog.rs      # Accès au catalogue
//! │   │   └── stream.rs       # Sonde de redirection
//! │   ├── cache.rs            # Cache des métadonnées
//! │   ├── disk_cache.rs       # Stockage SQLite (feature `disk-cache`)
//! │   ├── inflight.rs         # Déduplication des requêtes
//! │   ├── expander.rs         # Expansion des pages
//! │   ├── session.rs          # Session de lecture
//! │   ├── config_ext.rs       # Extension pmoconfig
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmosoundcloud::TrackResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = TrackResolver::from_config(pmoconfig::get_config())?;
//!
//!     let resolved = resolver.resolve_uri("soundcloud://555").await?;
//!     println!("{} -> {}", resolved.metadata.name, resolved.url);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Continuations
//!
//! ```rust,ignore
//! resolver.spawn_resolution(
//!     id,
//!     move |resolved| player.play(resolved),
//!     move |kind, detail| player.show_error(kind.key(), &detail),
//! );
//! ```
//!
//! ## Configuration
//!
//! Voir [`SoundCloudConfigExt`] : clé API et méthode de lecture sous
//! `accounts.soundcloud`, relues à chaque résolution.
//!
//! ## Voir aussi
//!
//! - [`pmoconfig`] : Configuration

pub mod api;
pub mod cache;
pub mod config_ext;
#[cfg(feature = "disk-cache")]
pub mod disk_cache;
pub mod error;
pub mod expander;
pub mod inflight;
pub mod metadata;
pub mod models;
pub mod resolver;
pub mod session;

pub use api::{ClientOptions, SoundCloudApi};
pub use cache::{CacheStore, Clock, ManualClock, MemoryCacheStore, MetadataCache, SystemClock};
pub use config_ext::{SettingsProvider, SoundCloudConfigExt, SoundCloudSettings};
pub use error::{ErrorKind, Result, SoundCloudError};
pub use expander::{CatalogPlaylistExpander, PlaylistExpander};
pub use models::{PlayMethod, ResolvedStream, TrackIdentifier, TrackMetadata, TrackRecord};
pub use resolver::{ResolutionState, TrackResolver};
pub use session::{PlaybackController, StreamSession};

#[cfg(feature = "disk-cache")]
pub use disk_cache::SqliteCacheStore;
