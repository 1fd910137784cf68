//! Stateful synchronous HTTP client built on `ureq`.
//!
//! # Overview
//! Requests are described declaratively with an [`OptionSet`] (query, one
//! body variant, headers, cookies, auth and per-call transport settings) and
//! sent through a [`Session`], which keeps cookies across calls and runs
//! user hooks around each exchange. Responses come back fully buffered as a
//! [`Response`] whose text can be re-decoded under another charset.
//!
//! # Design
//! - Request construction (`builder`) is pure: it produces a
//!   [`PreparedRequest`] without touching the network, so validation errors
//!   never disturb session state.
//! - Per-call transport settings (timeout, redirects, proxy, TLS and
//!   keep-alive toggles) live in a scoped guard that restores the session's
//!   default transport on drop. One call's overrides never reach the next.
//! - Cookies are stored flatly: every stored cookie goes to every host the
//!   session talks to.
//! - One call at a time per `Session`; independent sessions run in parallel.
//!
//! ```no_run
//! use session_core::{OptionSet, Session};
//!
//! let session = Session::new();
//! let options = OptionSet::new().query("q", "rust").timeout_secs(5);
//! let response = session.get("https://example.com/search", &options)?;
//! println!("{} {}", response.status(), response.text());
//! # Ok::<(), session_core::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod cookies;
pub mod error;
pub mod hooks;
pub mod http;
mod multipart;
pub mod options;
pub mod response;
pub mod session;
pub mod transport;

pub use crate::builder::build_request;
pub use crate::config::{HookFailurePolicy, SessionConfig};
pub use crate::error::{Error, HookError, Result};
pub use crate::http::{HttpMethod, PreparedRequest};
pub use crate::options::{FilePart, FileSource, MultipartField, OptionSet};
pub use crate::response::Response;
pub use crate::session::{RawResponse, Session};

/// Sends one request on a throwaway [`Session`].
pub fn request(method: &str, url: &str, options: &OptionSet) -> Result<Response> {
    Session::new().request(method, url, options)
}

pub fn get(url: &str, options: &OptionSet) -> Result<Response> {
    request("GET", url, options)
}

pub fn post(url: &str, options: &OptionSet) -> Result<Response> {
    request("POST", url, options)
}

pub fn head(url: &str, options: &OptionSet) -> Result<Response> {
    request("HEAD", url, options)
}

pub fn delete(url: &str, options: &OptionSet) -> Result<Response> {
    request("DELETE", url, options)
}

pub fn options(url: &str, options: &OptionSet) -> Result<Response> {
    request("OPTIONS", url, options)
}

pub fn put(url: &str, options: &OptionSet) -> Result<Response> {
    request("PUT", url, options)
}

pub fn patch(url: &str, options: &OptionSet) -> Result<Response> {
    request("PATCH", url, options)
}
