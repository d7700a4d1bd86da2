use crate::directory::DirectoryConfig;
use crate::error::{DirectoryError, Error, Result};
use crate::room::{Room, RoomOptions};
use anyhow::Context;
use parley_core::{ClientKey, CreateRoomRequest, CreateRoomResponse, ErrResponse};
use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

/// Entry point of the client: creates rooms and hands out [`Room`] handles.
///
/// Holds the client key for the lifetime of the process. The key is sent
/// when creating a room and inside every join frame, nowhere else.
pub struct SessionDirectory {
    http_url: Url,
    pipe_url: Url,
    client_key: ClientKey,
    http: reqwest::Client,
}

impl SessionDirectory {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(DirectoryConfig::new(endpoint))
    }

    pub fn with_config(config: DirectoryConfig) -> Result<Self> {
        let (http_url, pipe_url) = derive_urls(&config.endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        debug!("Session directory at {} / {}", http_url, pipe_url);
        Ok(Self {
            http_url,
            pipe_url,
            client_key: ClientKey::generate(),
            http,
        })
    }

    pub fn client_key(&self) -> &ClientKey {
        &self.client_key
    }

    pub fn http_url(&self) -> &Url {
        &self.http_url
    }

    pub fn pipe_url(&self) -> &Url {
        &self.pipe_url
    }

    /// Ask the server for a new room and return its identifier.
    pub async fn create_room(&self) -> Result<String, DirectoryError> {
        let request = CreateRoomRequest {
            client_key: self.client_key.to_string(),
        };
        let response = self
            .http
            .post(self.http_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failure_reason(status, &body));
        }

        let created: CreateRoomResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        info!("Created room {}", created.room_id);
        Ok(created.room_id)
    }

    /// Handle to a room. Nothing is sent until [`Room::connect`].
    pub fn get_room(&self, options: RoomOptions) -> Room {
        Room::new(self.pipe_url.clone(), self.client_key.clone(), options)
    }
}

/// Derive the HTTP and WebSocket forms of the server endpoint.
fn derive_urls(endpoint: &str) -> Result<(Url, Url)> {
    let url = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    let (http_scheme, ws_scheme) = match url.scheme() {
        "http" | "ws" => ("http", "ws"),
        "https" | "wss" => ("https", "wss"),
        other => {
            return Err(Error::InvalidEndpoint(format!(
                "{endpoint}: unsupported scheme {other}"
            )));
        }
    };

    let mut http_url = url.clone();
    let mut pipe_url = url;
    http_url
        .set_scheme(http_scheme)
        .map_err(|_| Error::InvalidEndpoint(endpoint.to_owned()))?;
    pipe_url
        .set_scheme(ws_scheme)
        .map_err(|_| Error::InvalidEndpoint(endpoint.to_owned()))?;
    Ok((http_url, pipe_url))
}

/// The server's own message when it sent one, else the status text.
fn failure_reason(status: StatusCode, body: &str) -> DirectoryError {
    if let Ok(err) = serde_json::from_str::<ErrResponse>(body) {
        if !err.error.is_empty() {
            return DirectoryError(err.error);
        }
    }
    let reason = status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| status.to_string());
    DirectoryError(reason)
}
