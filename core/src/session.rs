//! Stateful session: cookies, hooks and the per-call state machine.
//!
//! # Design
//! A call walks `build → configure → before-hooks → execute → after-hooks →
//! wrap → restore`. Everything mutable (client handle, cookie store, hook
//! lists, last request) lives in one `SessionState` behind a
//! `parking_lot::Mutex` that is held for the whole call, so concurrent
//! callers on one `Session` run strictly one after another. Sessions share
//! nothing and run fully in parallel.
//!
//! Validation happens before `configure`, so a bad method or conflicting
//! options never reach the transport. From `configure` on, the
//! [`TransportOverride`](crate::transport::TransportOverride) guard restores
//! the default transport on every exit path.

use parking_lot::Mutex;
use ureq::{Agent, ResponseExt, SendBody};

use crate::builder::build_request;
use crate::config::{HookFailurePolicy, SessionConfig};
use crate::cookies::CookieStore;
use crate::error::{Error, HookError, Result};
use crate::hooks::{HookFailure, HookPipeline};
use crate::http::{HttpMethod, PreparedRequest};
use crate::options::OptionSet;
use crate::response::Response;
use crate::transport::{ClientHandle, TransportSettings};

/// Response as handed to after-hooks, before its body is buffered.
pub type RawResponse = http::Response<ureq::Body>;

/// A reusable HTTP client with a flat cookie store and request/response hooks.
///
/// `Session` is `Send + Sync`; share it behind an `Arc` to call it from
/// several threads. Calls on one session are serialized.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: Mutex<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    client: ClientHandle,
    cookies: CookieStore,
    before: HookPipeline<PreparedRequest>,
    after: HookPipeline<RawResponse>,
    last_request: Option<PreparedRequest>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let state = SessionState {
            client: ClientHandle::new(config.max_redirects),
            cookies: CookieStore::new(),
            before: HookPipeline::new(),
            after: HookPipeline::new(),
            last_request: None,
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sends `method url` with `options` and buffers the response.
    ///
    /// `method` is matched case-insensitively against HEAD, GET, POST,
    /// DELETE, OPTIONS, PUT, PATCH, CONNECT and TRACE. Cookies stored by
    /// earlier calls are attached to the request, then the `Set-Cookie`
    /// headers of the final response are added to the store.
    ///
    /// # Errors
    /// Validation errors (`InvalidMethod`, `ParamConflict`,
    /// `FileInfoInvalid`, `Url`, header errors) are returned before the
    /// transport is touched. Transport failures surface as `Timeout`,
    /// `TooManyRedirects` or `Transport`. A failing hook yields `Hook` only
    /// under [`HookFailurePolicy::Abort`].
    pub fn request(&self, method: &str, url: &str, options: &OptionSet) -> Result<Response> {
        let mut state = self.state.lock();
        let SessionState {
            client,
            cookies,
            before,
            after,
            last_request,
        } = &mut *state;

        let method: HttpMethod = method.parse()?;
        let mut request = build_request(method, url, options, &self.config)?;
        request.append_cookies(cookies.pairs())?;

        let transport = client.configure(options)?;

        if let Err(failure) = before.run(&mut request) {
            on_hook_failure(self.config.hook_failure, "before", failure)?;
        }
        *last_request = Some(request.clone());

        tracing::debug!(%method, url = %request.url, "sending request");
        let mut raw = execute(transport.agent(), &request)?;

        if let Err(failure) = after.run(&mut raw) {
            if let Err(err) = on_hook_failure(self.config.hook_failure, "after", failure) {
                // Cookies of a completed exchange are kept even when the call aborts.
                cookies.absorb(raw.headers());
                return Err(err);
            }
        }

        let final_url = raw.get_uri().to_string();
        let (parts, mut body) = raw.into_parts();
        let bytes = body.with_config().limit(self.config.body_limit).read_to_vec()?;
        drop(transport);

        let stored = cookies.absorb(&parts.headers);
        tracing::debug!(
            %method,
            url = %final_url,
            status = parts.status.as_u16(),
            bytes = bytes.len(),
            cookies = stored,
            "request completed"
        );
        Ok(Response::new(parts.status, parts.headers, final_url, bytes))
    }

    pub fn get(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("GET", url, options)
    }

    pub fn post(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("POST", url, options)
    }

    pub fn head(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("HEAD", url, options)
    }

    pub fn delete(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("DELETE", url, options)
    }

    pub fn options(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("OPTIONS", url, options)
    }

    pub fn put(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("PUT", url, options)
    }

    pub fn patch(&self, url: &str, options: &OptionSet) -> Result<Response> {
        self.request("PATCH", url, options)
    }

    /// Appends a hook run on every outgoing request, after cookies are
    /// attached.
    ///
    /// # Errors
    /// `HookCapacityExceeded` when 8 before-hooks are already registered.
    pub fn register_before_hook<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&mut PreparedRequest) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.state.lock().before.register(Box::new(hook))
    }

    /// Appends a hook run on every raw response, before its body is read.
    ///
    /// # Errors
    /// `HookCapacityExceeded` when 8 after-hooks are already registered.
    pub fn register_after_hook<F>(&self, hook: F) -> Result<()>
    where
        F: Fn(&mut RawResponse) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.state.lock().after.register(Box::new(hook))
    }

    pub fn unregister_before_hook(&self, index: usize) -> Result<()> {
        self.state.lock().before.unregister(index)
    }

    pub fn unregister_after_hook(&self, index: usize) -> Result<()> {
        self.state.lock().after.unregister(index)
    }

    pub fn reset_before_hooks(&self) {
        self.state.lock().before.reset();
    }

    pub fn reset_after_hooks(&self) {
        self.state.lock().after.reset();
    }

    /// Snapshot of the stored cookies, in arrival order.
    pub fn cookies(&self) -> Vec<cookie::Cookie<'static>> {
        self.state.lock().cookies.iter().cloned().collect()
    }

    pub fn clear_cookies(&self) {
        self.state.lock().cookies.clear();
    }

    /// Transport settings currently applied; between calls these are always
    /// the defaults.
    pub fn transport_settings(&self) -> TransportSettings {
        self.state.lock().client.settings().clone()
    }

    /// The last request handed to the transport, as edited by before-hooks.
    pub fn last_request(&self) -> Option<PreparedRequest> {
        self.state.lock().last_request.clone()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn on_hook_failure(policy: HookFailurePolicy, stage: &'static str, failure: HookFailure) -> Result<()> {
    tracing::warn!(stage, index = failure.index, error = %failure.error, "hook failed");
    match policy {
        HookFailurePolicy::Continue => Ok(()),
        HookFailurePolicy::Abort => Err(Error::Hook {
            stage,
            index: failure.index,
            source: failure.error,
        }),
    }
}

fn execute(agent: &Agent, request: &PreparedRequest) -> Result<RawResponse> {
    let response = match &request.body {
        None => agent.run(to_http(request, ())?),
        Some(bytes) if request.chunked => {
            let mut reader: &[u8] = bytes;
            agent.run(to_http(request, SendBody::from_reader(&mut reader))?)
        }
        Some(bytes) => agent.run(to_http(request, bytes.as_slice())?),
    };
    Ok(response?)
}

fn to_http<B>(request: &PreparedRequest, body: B) -> Result<http::Request<B>> {
    let mut out = http::Request::new(body);
    *out.method_mut() = request.method.into();
    *out.uri_mut() = request.url.parse()?;
    *out.headers_mut() = request.headers.clone();
    Ok(out)
}
