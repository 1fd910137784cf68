//! Flat session cookie store.
//!
//! Cookies are kept in arrival order with no domain or path scoping: every
//! stored cookie is sent with every later request of the session, whatever
//! the target host. Attributes such as `Domain`, `Path` and `Expires` are kept
//! on the stored cookie but not acted on.

use cookie::Cookie;
use http::header::{HeaderMap, SET_COOKIE};

#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    cookies: Vec<Cookie<'static>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every parseable `Set-Cookie` header and returns how many
    /// cookies were stored.
    pub fn absorb(&mut self, headers: &HeaderMap) -> usize {
        let before = self.cookies.len();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                tracing::debug!("skipping non-ascii set-cookie header");
                continue;
            };
            match Cookie::parse(raw) {
                Ok(cookie) => {
                    tracing::trace!(name = cookie.name(), "storing cookie");
                    self.cookies.push(cookie.into_owned());
                }
                Err(err) => tracing::debug!(%err, "skipping malformed set-cookie header"),
            }
        }
        self.cookies.len() - before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.cookies.iter()
    }

    /// `(name, value)` pairs in arrival order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|c| (c.name(), c.value()))
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}
