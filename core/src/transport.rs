//! Per-call transport configuration with guaranteed restore.
//!
//! # Design
//! A `ClientHandle` owns the session's default `ureq::Agent`. When a call
//! needs a redirect policy, deadline, proxy or TLS/keep-alive/compression
//! setting other than the defaults, `configure` builds a one-off agent for
//! it and hands back a [`TransportOverride`] guard. Dropping the guard puts
//! the handle back to its defaults, on every exit path, including a failure
//! halfway through `configure` itself.

use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, Proxy};

use crate::error::{Error, Result};
use crate::options::OptionSet;

/// Transport-affecting settings of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub allow_redirects: bool,
    /// Whole-exchange deadline, `None` for unbounded.
    pub timeout: Option<Duration>,
    pub proxy: Option<String>,
    pub disable_keep_alive: bool,
    pub disable_compression: bool,
    pub skip_tls_verify: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            allow_redirects: true,
            timeout: None,
            proxy: None,
            disable_keep_alive: false,
            disable_compression: false,
            skip_tls_verify: false,
        }
    }
}

impl TransportSettings {
    pub fn from_options(options: &OptionSet) -> Self {
        Self {
            allow_redirects: options.allow_redirects,
            timeout: (options.timeout_secs > 0).then(|| Duration::from_secs(options.timeout_secs)),
            proxy: options.proxy.clone().filter(|p| !p.is_empty()),
            disable_keep_alive: options.disable_keep_alive,
            disable_compression: options.disable_compression,
            skip_tls_verify: options.skip_tls_verify,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// The session's reusable transport.
#[derive(Debug)]
pub struct ClientHandle {
    max_redirects: u32,
    default_agent: Agent,
    call_agent: Option<Agent>,
    settings: TransportSettings,
}

impl ClientHandle {
    pub fn new(max_redirects: u32) -> Self {
        let settings = TransportSettings::default();
        Self {
            max_redirects,
            default_agent: agent_builder(&settings, max_redirects).build().new_agent(),
            call_agent: None,
            settings,
        }
    }

    /// Settings currently applied.
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Whether a per-call agent is installed.
    pub fn is_overridden(&self) -> bool {
        self.call_agent.is_some()
    }

    /// Applies the transport settings of `options` until the returned guard
    /// is dropped.
    ///
    /// # Errors
    /// `ProxyUrl` when the proxy URL is malformed. The handle is already
    /// restored when the error is returned.
    pub fn configure(&mut self, options: &OptionSet) -> Result<TransportOverride<'_>> {
        let settings = TransportSettings::from_options(options);
        let guard = TransportOverride { handle: self };
        guard.handle.settings = settings;

        if !guard.handle.settings.is_default() {
            let agent = build_agent(&guard.handle.settings, guard.handle.max_redirects)?;
            tracing::debug!(settings = ?guard.handle.settings, "applied transport overrides");
            guard.handle.call_agent = Some(agent);
        }
        Ok(guard)
    }

    fn restore(&mut self) {
        if self.call_agent.take().is_some() {
            tracing::debug!("restored default transport");
        }
        self.settings = TransportSettings::default();
    }
}

/// Scoped transport override. Restores the handle's defaults on drop.
#[derive(Debug)]
pub struct TransportOverride<'a> {
    handle: &'a mut ClientHandle,
}

impl TransportOverride<'_> {
    /// The agent to run this call on.
    pub fn agent(&self) -> &Agent {
        self.handle
            .call_agent
            .as_ref()
            .unwrap_or(&self.handle.default_agent)
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.handle.settings
    }
}

impl Drop for TransportOverride<'_> {
    fn drop(&mut self) {
        self.handle.restore();
    }
}

fn agent_builder(
    settings: &TransportSettings,
    max_redirects: u32,
) -> ureq::config::ConfigBuilder<ureq::typestate::AgentScope> {
    Agent::config_builder()
        .http_status_as_error(false)
        .proxy(None)
        .max_redirects(if settings.allow_redirects { max_redirects } else { 0 })
        .max_redirects_will_error(true)
        .timeout_global(settings.timeout)
}

fn build_agent(settings: &TransportSettings, max_redirects: u32) -> Result<Agent> {
    let mut builder = agent_builder(settings, max_redirects);
    if settings.disable_keep_alive {
        builder = builder.max_idle_connections(0).max_idle_connections_per_host(0);
    }
    if settings.disable_compression {
        builder = builder.accept_encoding("");
    }
    if settings.skip_tls_verify {
        builder = builder.tls_config(TlsConfig::builder().disable_verification(true).build());
    }
    if let Some(url) = &settings.proxy {
        let proxy = Proxy::new(url).map_err(|source| Error::ProxyUrl {
            url: url.clone(),
            source,
        })?;
        builder = builder.proxy(Some(proxy));
    }
    Ok(builder.build().new_agent())
}
