//! HTTP method and prepared-request types.
//!
//! # Design
//! `PreparedRequest` describes the outgoing request as plain data. The
//! builder produces it without touching the network, before-hooks may edit
//! it, and only then does the session hand it to the transport. Keeping it
//! data-only makes request construction deterministic and testable on its own.

use std::fmt;
use std::str::FromStr;

use http::header::{AsHeaderName, HeaderMap, HeaderValue};

use crate::error::Error;

/// HTTP methods accepted by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Head,
    Get,
    Post,
    Delete,
    Options,
    Put,
    Patch,
    Connect,
    Trace,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Head => "HEAD",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

/// Parses a method name case-insensitively.
impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "HEAD" => HttpMethod::Head,
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "CONNECT" => HttpMethod::Connect,
            "TRACE" => HttpMethod::Trace,
            _ => return Err(Error::InvalidMethod(s.to_string())),
        };
        Ok(method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Connect => http::Method::CONNECT,
            HttpMethod::Trace => http::Method::TRACE,
        }
    }
}

/// An outgoing request described as plain data.
///
/// Built by [`build_request`](crate::builder::build_request). Headers use
/// set semantics: inserting a name replaces every earlier value for it.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Send the body with chunked transfer encoding instead of a
    /// `Content-Length`.
    pub chunked: bool,
}

impl PreparedRequest {
    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Length announced on the wire, `None` for chunked or bodiless requests.
    pub fn content_length(&self) -> Option<u64> {
        match &self.body {
            Some(body) if !self.chunked => Some(body.len() as u64),
            _ => None,
        }
    }

    /// Appends `name=value` pairs to the `Cookie` header, keeping any cookies
    /// already on the request.
    pub(crate) fn append_cookies<'a, I>(&mut self, pairs: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut line = self.header(http::header::COOKIE).unwrap_or_default().to_string();
        for (name, value) in pairs {
            if !line.is_empty() {
                line.push_str("; ");
            }
            line.push_str(name);
            line.push('=');
            line.push_str(value);
        }
        if !line.is_empty() {
            self.headers.insert(http::header::COOKIE, HeaderValue::from_str(&line)?);
        }
        Ok(())
    }
}
