//! Error types for the session client.
//!
//! # Design
//! Validation failures (`InvalidMethod`, `ParamConflict`, `TypeMismatch`,
//! `FileInfoInvalid`) are raised while the request is being built, before the
//! transport is configured, so they never leave session state altered.
//! Transport failures keep the `ureq` error intact, except for timeouts and
//! redirect exhaustion, which callers match on often enough to get their own
//! variants.

/// Boxed error returned by a failing hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by `Session`, `OptionSet` and `Response`.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The method is not one of HEAD, GET, POST, DELETE, OPTIONS, PUT, PATCH,
    /// CONNECT or TRACE.
    #[error("invalid method: {0:?}")]
    InvalidMethod(String),

    /// More than one of form, raw, json and files is populated.
    #[error("options param conflict: at most one of form, raw, json, files may be set")]
    ParamConflict,

    /// A multipart field has no filename, no content, or an unknown shape.
    #[error("invalid file information for field {field:?}: {reason}")]
    FileInfoInvalid { field: String, reason: &'static str },

    /// `Response::set_encoding` was given a label no decoder knows.
    #[error("unrecognized encoding: {0:?}")]
    UnrecognizedEncoding(String),

    /// A hook list already holds its maximum number of hooks.
    #[error("hook list is full ({capacity} hooks)")]
    HookCapacityExceeded { capacity: usize },

    /// Unregistering a hook at a position past the end of its list.
    #[error("hook index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A value that must be a string has another JSON type.
    #[error("{key:?} must be a string, found {found}")]
    TypeMismatch { key: String, found: &'static str },

    /// The request URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A before-hook left a URL the transport cannot send to.
    #[error("invalid request uri: {0}")]
    Uri(#[from] http::uri::InvalidUri),

    /// The proxy URL could not be parsed by the transport.
    #[error("invalid proxy url {url:?}: {source}")]
    ProxyUrl {
        url: String,
        #[source]
        source: ureq::Error,
    },

    /// A header name supplied in the options is not a valid HTTP token.
    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    /// A header value contains bytes not allowed on the wire.
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Reading a multipart source file or writing a response to disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a request body or decoding of a response body failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The overall deadline set by `timeout_secs` elapsed.
    #[error("request timed out: {0}")]
    Timeout(ureq::Timeout),

    /// More redirects than the session allows.
    #[error("too many redirects")]
    TooManyRedirects,

    /// Connection, TLS or protocol failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[source] ureq::Error),

    /// A hook failed and the session is configured to abort on hook failure.
    #[error("{stage} hook #{index} failed: {source}")]
    Hook {
        stage: &'static str,
        index: usize,
        #[source]
        source: HookError,
    },
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(which) => Error::Timeout(which),
            ureq::Error::TooManyRedirects => Error::TooManyRedirects,
            other => Error::Transport(other),
        }
    }
}
