//! Render request construction and result decoding.

use crate::catalog::Template;
use crate::form::FormValues;
use crate::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A successfully decoded render
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Request URL that produced the image
    pub url: String,
    pub bytes: Vec<u8>,
    pub format: image::ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    /// File extension matching the decoded format (`png`, `gif`, ...).
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Build the render URL for a template and its submitted form values.
///
/// Fixed query parameters of `endpoint` are kept, then `type` is appended
/// verbatim, then every non-blank value (trimmed) in field order. Keys and
/// values are percent-encoded the way `encodeURIComponent` does it, so a
/// space is `%20` and `( ) ! ' *` stay literal. The result depends only on
/// the inputs.
pub fn build_render_url(
    endpoint: &str,
    template: &Template,
    values: &FormValues,
) -> Result<String> {
    let parsed = Url::parse(endpoint)?;
    let mut url = endpoint.to_string();
    match parsed.query() {
        None => url.push('?'),
        Some("") => {}
        Some(_) if url.ends_with('&') => {}
        Some(_) => url.push('&'),
    }
    url.push_str("type=");
    url.push_str(&template.kind.to_string());
    for (key, value) in values.submitted() {
        url.push('&');
        url.extend(utf8_percent_encode(key, URI_COMPONENT));
        url.push('=');
        url.extend(utf8_percent_encode(value, URI_COMPONENT));
    }
    Ok(url)
}

/// Decode a fetched body; a body that is not an image is a render failure.
pub fn decode_image(url: &str, bytes: Vec<u8>) -> Result<RenderedImage> {
    let format = image::guess_format(&bytes)
        .map_err(|e| Error::Render(format!("unrecognized image data from {}: {}", url, e)))?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| Error::Render(format!("failed to decode image from {}: {}", url, e)))?;

    Ok(RenderedImage {
        url: url.to_string(),
        width: decoded.width(),
        height: decoded.height(),
        format,
        bytes,
    })
}
