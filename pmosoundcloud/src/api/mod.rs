//! Couche d'accès à l'API REST SoundCloud
//!
//! Ce module fournit une interface bas-niveau pour communiquer avec le
//! catalogue SoundCloud et sonder les redirections de flux.
//!
//! Trois clients HTTP sont construits :
//! - un client standard (redirections suivies) pour le catalogue
//! - un client sans redirection pour capturer l'en-tête `Location`
//! - un client de streaming sans délai global, limité par connexion et par
//!   lecture, pour les transferts longs

pub mod catalog;
pub mod stream;

use crate::config_ext::{DEFAULT_CATALOG_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TRANSPORT_TIMEOUT};
use crate::error::{excerpt, Result, SoundCloudError};
use reqwest::{redirect, Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("pmosoundcloud/", env!("CARGO_PKG_VERSION"));

/// Options de construction des clients HTTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// URL de base du catalogue, sans `/` final
    pub catalog_url: String,
    /// Accepte les certificats TLS invalides
    pub insecure_tls: bool,
    /// Timeout propre à la requête `/tracks/<id>`
    pub request_timeout: Duration,
    /// Timeout de toutes les autres requêtes
    pub transport_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            insecure_tls: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transport_timeout: DEFAULT_TRANSPORT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Options par défaut pointant vers un autre catalogue
    pub fn with_catalog_url(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            ..Default::default()
        }
    }
}

/// Client API bas-niveau pour communiquer avec SoundCloud
pub struct SoundCloudApi {
    /// Client HTTP standard
    client: Client,
    /// Client HTTP qui ne suit pas les redirections
    probe_client: Client,
    /// Client HTTP des sessions de streaming
    streaming_client: Client,
    /// URL de base du catalogue
    base_url: String,
    /// Timeout de la requête catalogue
    request_timeout: Duration,
}

impl SoundCloudApi {
    /// Crée une nouvelle instance de l'API
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = Self::builder(&options)
            .build()
            .map_err(|e| SoundCloudError::Configuration(e.to_string()))?;
        let probe_client = Self::builder(&options)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| SoundCloudError::Configuration(e.to_string()))?;
        let streaming_client = Self::streaming_builder(&options)
            .build()
            .map_err(|e| SoundCloudError::Configuration(e.to_string()))?;

        if options.insecure_tls {
            warn!("TLS certificate verification disabled for SoundCloud requests");
        }

        Ok(Self {
            client,
            probe_client,
            streaming_client,
            base_url: options.catalog_url.trim_end_matches('/').to_string(),
            request_timeout: options.request_timeout,
        })
    }

    fn builder(options: &ClientOptions) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(options.transport_timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(options.insecure_tls)
    }

    /// Le flux peut durer aussi longtemps que la piste : seuls la connexion
    /// et chaque lecture sont bornées par le timeout de transport.
    fn streaming_builder(options: &ClientOptions) -> reqwest::ClientBuilder {
        Client::builder()
            .connect_timeout(options.transport_timeout)
            .read_timeout(options.transport_timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(options.insecure_tls)
    }

    /// Client standard du catalogue
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Client à utiliser pour ouvrir une [`StreamSession`](crate::StreamSession)
    pub fn streaming_client(&self) -> &Client {
        &self.streaming_client
    }

    /// Retourne l'URL de base du catalogue
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ajoute l'en-tête `Authorization: OAuth <clé>`
    pub(crate) fn authorize(request: RequestBuilder, api_key: &str) -> RequestBuilder {
        if api_key.is_empty() {
            return request;
        }
        request.header(reqwest::header::AUTHORIZATION, format!("OAuth {}", api_key))
    }

    /// GET sur le catalogue, retourne le corps JSON
    pub(crate) async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} with {} params", url, params.len());

        let mut request = Self::authorize(self.client.get(&url), api_key).query(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Catalog request to {} failed: {}", url, e);
            SoundCloudError::CatalogFetchFailed(e.to_string())
        })?;
        Self::handle_response(response).await
    }

    /// Traite la réponse du catalogue
    ///
    /// Un champ `error` (ou `errors[0].error_message`) prime sur le statut
    /// HTTP et sur le décodage typé.
    async fn handle_response(response: Response) -> Result<Value> {
        let status = response.status();
        debug!("Response status: {}", status);

        let text = response
            .text()
            .await
            .map_err(|e| SoundCloudError::CatalogFetchFailed(e.to_string()))?;

        let json: Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(e) if status.is_success() => {
                warn!("Failed to parse catalog response: {}", e);
                return Err(SoundCloudError::CatalogFetchFailed(e.to_string()));
            }
            Err(_) => {
                warn!("Catalog error ({}): {}", status, excerpt(&text));
                return Err(SoundCloudError::CatalogFetchFailed(format!(
                    "{}: {}",
                    status,
                    excerpt(&text)
                )));
            }
        };

        if let Some(message) = reported_error(&json) {
            warn!("SoundCloud API error: {}", message);
            return Err(SoundCloudError::CatalogReportedError(message));
        }

        if !status.is_success() {
            return Err(SoundCloudError::CatalogFetchFailed(format!(
                "{}: {}",
                status,
                excerpt(&text)
            )));
        }

        Ok(json)
    }
}

/// Message d'erreur explicite porté par un corps JSON
fn reported_error(json: &Value) -> Option<String> {
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        return Some(match error {
            Value::String(message) => message.clone(),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            other => other.to_string(),
        });
    }

    json.get("errors")?
        .as_array()?
        .first()
        .map(|first| {
            first
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| first.to_string())
        })
}
