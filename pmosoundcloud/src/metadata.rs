//! Projection d'une [`TrackRecord`] en [`TrackMetadata`] d'affichage
//!
//! Fonctions pures, sans I/O.

use crate::models::{TrackMetadata, TrackRecord, URI_SCHEME};

/// Album affiché pour toutes les pistes
pub const ALBUM_LABEL: &str = "SoundCloud";

/// Débit nominal annoncé (les flux SoundCloud sont en MP3 128 kbps)
pub const NOMINAL_BITRATE: &str = "128k";

/// Marqueur de type de contenu
pub const CONTENT_TYPE: &str = "audio";

/// Demande la variante 500x500 de la pochette au lieu de `-large`
///
/// Toutes les occurrences sont remplacées ; l'opération est idempotente.
pub fn upgrade_artwork(url: Option<&str>) -> String {
    url.unwrap_or_default().replace("-large", "-t500x500")
}

/// Année d'affichage
///
/// `release_year` s'il est un entier positif, sinon les quatre premiers
/// caractères de `created_at` s'ils forment une année, sinon une chaîne vide.
pub fn derive_year(release_year: Option<&str>, created_at: Option<&str>) -> String {
    if let Some(year) = release_year.and_then(positive_int) {
        return year.to_string();
    }

    created_at
        .and_then(|ts| ts.get(..4))
        .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Tempo s'il est un entier positif
pub fn sanitize_bpm(bpm: Option<&str>) -> Option<u32> {
    bpm.and_then(positive_int)
}

fn positive_int(value: &str) -> Option<u32> {
    // Le catalogue envoie parfois "128.0"
    let value = value.trim();
    let parsed = value
        .parse::<u32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as u32))?;
    (parsed > 0).then_some(parsed)
}

/// Construit les métadonnées cachées d'une piste
///
/// La durée est tronquée à la seconde ; le lecteur reçoit la valeur exacte
/// via [`player_duration`].
pub fn make_metadata(record: &TrackRecord) -> TrackMetadata {
    let artwork = upgrade_artwork(record.artwork_url.as_deref());

    TrackMetadata {
        id: record.id.clone(),
        duration: record.duration / 1000,
        name: record.title.clone(),
        artist: record.artist().to_string(),
        album: ALBUM_LABEL.to_string(),
        play: format!("{}{}", URI_SCHEME, record.id),
        bitrate: NOMINAL_BITRATE.to_string(),
        bpm: sanitize_bpm(record.bpm.as_deref()),
        content_type: CONTENT_TYPE.to_string(),
        image: artwork.clone(),
        icon: artwork.clone(),
        cover: artwork,
        year: derive_year(record.release_year.as_deref(), record.created_at.as_deref()),
    }
}

/// Durée non arrondie en secondes, pour le lecteur
pub fn player_duration(record: &TrackRecord) -> f64 {
    record.duration as f64 / 1000.0
}

/// Métadonnées de substitution quand la piste n'a pas pu être décrite
///
/// Le nom et l'URI de lecture reprennent l'URI demandée telle quelle.
pub fn placeholder_metadata(uri: &str) -> TrackMetadata {
    TrackMetadata {
        id: uri.strip_prefix(URI_SCHEME).unwrap_or_default().to_string(),
        duration: 0,
        name: uri.to_string(),
        artist: String::new(),
        album: String::new(),
        play: uri.to_string(),
        bitrate: String::new(),
        bpm: None,
        content_type: CONTENT_TYPE.to_string(),
        image: String::new(),
        icon: String::new(),
        cover: String::new(),
        year: String::new(),
    }
}
