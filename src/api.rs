//! Remote endpoints: the template list and the renderer.

use crate::catalog::Catalog;
use crate::render::{decode_image, RenderedImage};
use crate::{ClientConfig, Error, Result};
use reqwest::blocking::Client;
use std::time::Duration;

/// Boundary to the remote meme service.
///
/// The controller never talks to the network itself; sessions run effects
/// through an implementation of this trait, which lets tests swap in
/// in-memory fakes.
pub trait MemeApi: Send + Sync {
    /// Fetch and normalize the template catalog.
    fn fetch_catalog(&self) -> Result<Catalog>;

    /// Fetch a render URL and decode the body as an image.
    fn fetch_image(&self, url: &str) -> Result<RenderedImage>;
}

/// `MemeApi` over blocking reqwest
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        // reqwest's blocking client defaults to 30s; no timeout means wait forever
        builder = builder.timeout(config.timeout_ms.map(Duration::from_millis));
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET `url` and return the body, retrying network failures up to
    /// `max_retries` times.
    fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let mut attempt = 0;
        loop {
            match self.get_once(url) {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "GET {} failed ({}), retry {}/{}",
                        url,
                        e,
                        attempt,
                        self.config.max_retries
                    );
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    std::thread::sleep(Duration::from_millis(backoff));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_once(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|e| format!("HTTP GET failed: {}", e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(format!("HTTP status {}", status));
        }
        let body = res
            .bytes()
            .map_err(|e| format!("Failed to read response body: {}", e))?;
        Ok(body.to_vec())
    }
}

impl MemeApi for HttpApi {
    fn fetch_catalog(&self) -> Result<Catalog> {
        let url = &self.config.catalog_endpoint;
        log::info!("loading catalog from {}", url);
        let body = self.get_bytes(url).map_err(Error::Network)?;
        let payload: serde_json::Value = serde_json::from_slice(&body)?;
        Catalog::from_payload(&payload)
    }

    fn fetch_image(&self, url: &str) -> Result<RenderedImage> {
        log::info!("requesting render {}", url);
        let body = self.get_bytes(url).map_err(Error::Render)?;
        decode_image(url, body)
    }
}
