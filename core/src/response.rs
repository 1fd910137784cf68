//! Buffered response wrapper.
//!
//! # Design
//! The body is read into memory exactly once, when the session wraps the
//! exchange. Everything afterwards (`text`, `set_encoding`, `json`,
//! `save_to_file`) works on that buffer, so the text can be re-decoded under a
//! different charset without another round trip.

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use http::header::HeaderMap;
use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Encoding label every response starts out with.
pub const DEFAULT_ENCODING: &str = "utf-8";

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    bytes: Vec<u8>,
    encoding: String,
    text: String,
}

impl Response {
    /// Wraps an already buffered body, decoding it as UTF-8.
    ///
    /// Invalid sequences are replaced with U+FFFD.
    pub fn new(status: StatusCode, headers: HeaderMap, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Self {
            status,
            headers,
            url: url.into(),
            bytes,
            encoding: DEFAULT_ENCODING.to_string(),
            text,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// URL of the final response, after any redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Body decoded under [`encoding`](Self::encoding).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Label of the encoding `text` was decoded with.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Re-decodes the buffered body under the charset named by `label`.
    ///
    /// Labels are matched case-insensitively, so `"GBK"` and `"gbk"` name the
    /// same decoder. Asking for the current encoding is a no-op.
    ///
    /// # Errors
    /// `UnrecognizedEncoding` when no decoder is known for `label`; the text
    /// and encoding are left as they were.
    pub fn set_encoding(&mut self, label: &str) -> Result<()> {
        if self.encoding.eq_ignore_ascii_case(label) {
            return Ok(());
        }
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::UnrecognizedEncoding(label.to_string()))?;

        let (text, had_errors) = encoding.decode_without_bom_handling(&self.bytes);
        if had_errors {
            tracing::debug!(encoding = encoding.name(), "replaced malformed sequences while decoding");
        }
        self.text = text.into_owned();
        self.encoding = label.to_string();
        Ok(())
    }

    /// Deserializes the body as JSON, whatever its `Content-Type`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    /// Writes the raw body bytes to `path`, replacing any existing file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }
}
