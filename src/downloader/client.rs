// Shared HTTP plumbing for the bilibili web API
//
// Every API call goes through `ApiClient::get_data`, which enforces the
// request discipline (browser user agent plus a per-video referer) and the
// two-level success check: HTTP 200 and an envelope `code` of 0.

use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::errors::DownloadError;
use super::models::NetworkConfig;

/// Envelope code the API uses for success
pub const API_SUCCESS: i64 = 0;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<serde_json::Value>,
}

/// Build the reqwest client shared by API calls and media downloads.
///
/// Only the connect phase is bounded here; request and chunk timeouts are
/// applied per call so long media transfers are not cut off.
pub fn build_http_client(config: &NetworkConfig) -> Result<reqwest::Client, DownloadError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.timeout_secs));

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| DownloadError::Network(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| DownloadError::Network(format!("Failed to build HTTP client: {}", e)))
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: NetworkConfig,
}

impl ApiClient {
    pub fn new(config: NetworkConfig) -> Result<Self, DownloadError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Absolute URL for an API path such as `/x/player/playurl?...`
    pub fn endpoint(&self, path_and_query: &str) -> String {
        format!("{}{}", self.config.api_base, path_and_query)
    }

    /// GET an API endpoint and decode the `data` member of its envelope.
    ///
    /// `context` names the call in error messages ("metadata", "playurl").
    pub async fn get_data<T: DeserializeOwned>(
        &self,
        url: &str,
        referer: &str,
        context: &str,
    ) -> Result<T, DownloadError> {
        debug!(%url, %referer, "[{}] GET", context);

        let response = self
            .http
            .get(url)
            .header(REFERER, referer)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        decode_envelope(status, &body, context)
    }
}

fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    context: &str,
) -> Result<T, DownloadError> {
    let envelope = serde_json::from_slice::<ApiEnvelope>(body);

    if status != StatusCode::OK {
        // An error envelope still explains more than the bare status does
        return match envelope {
            Ok(env) if env.code != API_SUCCESS => Err(DownloadError::Application {
                code: env.code,
                message: env.message,
            }),
            _ => Err(DownloadError::transport(status.as_u16(), context)),
        };
    }

    let envelope = envelope
        .map_err(|e| DownloadError::malformed(format!("{} response is not an API envelope: {}", context, e)))?;

    if envelope.code != API_SUCCESS {
        return Err(DownloadError::Application {
            code: envelope.code,
            message: envelope.message,
        });
    }

    let data = envelope
        .data
        .filter(|d| !d.is_null())
        .ok_or_else(|| DownloadError::malformed(format!("{} response has no data", context)))?;

    serde_json::from_value(data)
        .map_err(|e| DownloadError::malformed(format!("{} data has unexpected shape: {}", context, e)))
}
