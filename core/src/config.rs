//! Session-wide configuration.
//!
//! These are the defaults a session returns to after every call. Per-call
//! overrides come from `OptionSet` and never change a `SessionConfig`.

use serde::Deserialize;

/// What a session does when a before- or after-hook returns an error.
///
/// Either way the remaining hooks of that list are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookFailurePolicy {
    /// Log the failure and carry on with the exchange.
    #[default]
    Continue,
    /// Stop the call and return `Error::Hook`.
    Abort,
}

/// Defaults applied by a [`Session`](crate::Session) to every call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sent as `User-Agent` unless the options set one.
    pub user_agent: String,
    /// Redirect hops followed before failing with `TooManyRedirects`.
    pub max_redirects: u32,
    /// Largest response body buffered, in bytes.
    pub body_limit: u64,
    pub hook_failure: HookFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("session-core/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
            body_limit: 64 * 1024 * 1024,
            hook_failure: HookFailurePolicy::Continue,
        }
    }
}
