//! Résolution d'une piste SoundCloud depuis la ligne de commande
//!
//! Cet exemple montre comment :
//! - Construire un résolveur depuis la configuration PMOMusic
//! - Résoudre une URI `soundcloud://<id>` (ou développer une page SoundCloud)
//! - Lire les premiers octets du flux
//!
//! Usage : `cargo run --example resolve_track -- soundcloud://123456`
//!
//! La clé API se règle dans `config.yaml` (`accounts.soundcloud.api_key`) ou
//! via `PMOMUSIC_CONFIG__ACCOUNTS__SOUNDCLOUD__API_KEY`.

use pmosoundcloud::{ErrorKind, PlaybackController, StreamSession, TrackResolver};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct ConsoleController;

impl PlaybackController for ConsoleController {
    fn direct_stream_failed(&self, track_id: &str, kind: ErrorKind, detail: &str) {
        eprintln!("✗ Lecture de {} interrompue [{}] : {}", track_id, kind.key(), detail);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pmoconfig::get_config();

    // Initialiser le logging (RUST_LOG prime sur la configuration)
    if config.get_log_enable_console() {
        let level = config.get_log_min_level()?.to_lowercase();
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
            .init();
    }

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "soundcloud://1".to_string());

    println!("=== PMOSoundCloud - Résolution de piste ===\n");

    let resolver = TrackResolver::from_config(config)?;

    let uris = resolver.explode_playlist(&uri).await?;
    println!("{} piste(s) à résoudre", uris.len());

    for uri in uris {
        println!("\n--- {} ---", uri);

        let resolved = match resolver.resolve_uri(&uri).await {
            Ok(resolved) => resolved,
            Err(e) => {
                println!("✗ [{}] {}", e.kind().key(), e.detail());
                continue;
            }
        };

        let metadata = &resolved.metadata;
        println!("✓ {} - {}", metadata.artist, metadata.name);
        println!("  Durée: {:.1}s", resolved.duration);
        println!("  Année: {}", metadata.year);
        println!("  Pochette: {}", metadata.cover);
        println!("  Méthode: {}", resolved.play_method.as_str());
        println!("  URL: {}", resolved.url);

        let controller = Arc::new(ConsoleController);
        if let Ok(mut session) =
            StreamSession::open(&resolved, resolver.api().streaming_client(), controller).await
        {
            if let Some(chunk) = session.next_chunk().await? {
                println!("  Premier bloc: {} octets ({})", chunk.len(), session.content_type());
            }
        }
    }

    Ok(())
}
