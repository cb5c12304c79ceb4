//! memekit
//!
//! A headless client for a remote meme generation service: browse the
//! template catalog, fill in a template's parameters and request a rendered
//! image, with a short history of recent renders.
//!
//! # Layout
//!
//! - [`catalog`]: decoding and searching the template list
//! - [`form`]: parameter forms derived from a template
//! - [`render`]: render URL construction and image decoding
//! - [`history`]: the recently generated list
//! - [`controller`]: application state as a command/effect state machine
//! - [`session`] / [`async_api`]: executing effects against a [`api::MemeApi`]
//!
//! # Example
//!
//! ```no_run
//! use memekit::{ClientConfig, Command, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(ClientConfig::default())?;
//! session.dispatch(Command::OpenCatalog)?;
//! session.wait_idle();
//!
//! let id = session.controller().visible()[0].id.clone();
//! session.dispatch(Command::Select(id))?;
//! session.dispatch(Command::Generate)?;
//! session.wait_idle();
//!
//! if let Some(shown) = session.controller().shown() {
//!     println!("rendered: {}", shown.url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod api;
pub mod async_api;
pub mod catalog;
pub mod controller;
pub mod form;
pub mod history;
pub mod render;
pub mod session;

pub use api::{HttpApi, MemeApi};
pub use async_api::MemeClient;
pub use catalog::{Catalog, Template, TemplateType};
pub use controller::{Command, Controller, Effect, Event, Phase, Shown};
pub use form::{FieldSpec, FormSpec, FormValues, Locale};
pub use history::{History, HistoryEntry, HISTORY_LIMIT};
pub use render::RenderedImage;
pub use session::Session;

use serde::Deserialize;
use std::path::Path;

/// Endpoint of the template list
pub const DEFAULT_CATALOG_ENDPOINT: &str =
    "https://api.lolimi.cn/API/preview/api?action=meme_info";

/// Endpoint of the renderer; `type` and the form values are appended
pub const DEFAULT_RENDER_ENDPOINT: &str =
    "https://api.lolimi.cn/API/preview/api.php?action=create_meme";

/// Configuration for the meme client
///
/// Defaults point at the public service, wait indefinitely for replies and
/// never retry.
///
/// # Examples
///
/// ```
/// let cfg = memekit::ClientConfig::default();
/// assert_eq!(cfg.max_retries, 0);
/// assert!(cfg.timeout_ms.is_none());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL returning the template catalog
    pub catalog_endpoint: String,
    /// Base URL of the renderer, may carry fixed query parameters
    pub render_endpoint: String,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Request timeout in milliseconds (`None` waits forever)
    pub timeout_ms: Option<u64>,
    /// Extra attempts after a failed request
    pub max_retries: u32,
    /// Base delay between retries, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// Language of labels and notices
    pub locale: Locale,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            catalog_endpoint: DEFAULT_CATALOG_ENDPOINT.to_string(),
            render_endpoint: DEFAULT_RENDER_ENDPOINT.to_string(),
            user_agent: format!("memekit/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            locale: Locale::default(),
        }
    }
}

impl ClientConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Check that both endpoints are absolute URLs.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.catalog_endpoint)?;
        url::Url::parse(&self.render_endpoint)?;
        Ok(())
    }
}
