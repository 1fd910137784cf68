//! Session behaviour against the live echo server.
//!
//! # Design
//! Each test starts its own echo server on a random port and drives a
//! synchronous `Session` against it over real HTTP, so request encoding,
//! transport overrides, hooks and cookie persistence are all checked
//! end-to-end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use echo_server::{Echo, MultipartDump};
use http::header::HeaderValue;
use session_core::{
    Error, FilePart, HookFailurePolicy, MultipartField, OptionSet, Session, SessionConfig,
};

/// Starts the echo server on a random port and returns its base URL.
fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            echo_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn echo_of(session: &Session, method: &str, url: &str, options: &OptionSet) -> Echo {
    let response = session.request(method, url, options).unwrap();
    assert_eq!(response.status(), 200);
    response.json().unwrap()
}

// --- request encoding ---

#[test]
fn multipart_file_reaches_server() {
    let base = spawn_server();
    let session = Session::new();
    let options = OptionSet::new()
        .file("f", FilePart::from_bytes("x.txt", "hello"))
        .file("note", MultipartField::from("plain text"));

    let dump: MultipartDump = session
        .post(&format!("{base}/multipart"), &options)
        .unwrap()
        .json()
        .unwrap();
    let file = &dump.files["f"];
    assert_eq!(file.content, "hello");
    assert_eq!(file.filename, "x.txt");
    assert_eq!(file.content_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(dump.fields["note"], "plain text");
}

#[test]
fn multipart_file_is_read_from_disk_with_sibling_fields() {
    let base = spawn_server();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    std::fs::write(&path, "a,b\n1,2\n").unwrap();

    let part = FilePart::from_path(&path).mime("text/csv").field("token", "abc");
    let options = OptionSet::new().file("upload", part);
    let dump: MultipartDump = Session::new()
        .post(&format!("{base}/multipart"), &options)
        .unwrap()
        .json()
        .unwrap();

    let file = &dump.files["upload"];
    assert_eq!(file.filename, "report.csv");
    assert_eq!(file.content_type.as_deref(), Some("text/csv"));
    assert_eq!(file.content, "a,b\n1,2\n");
    assert_eq!(dump.fields["token"], "abc");
}

#[test]
fn form_body_is_urlencoded() {
    let base = spawn_server();
    let options = OptionSet::new().form("a", "1").form("b", "x y");
    let echo = echo_of(&Session::new(), "POST", &format!("{base}/echo"), &options);

    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded");
    let form = echo.form.unwrap();
    assert_eq!(form["a"], "1");
    assert_eq!(form["b"], "x y");
    assert_eq!(form.len(), 2);
}

#[test]
fn json_body_is_serialized() {
    let base = spawn_server();
    let options = OptionSet::new().json("n", 1).json("name", "widget");
    let echo = echo_of(&Session::new(), "PUT", &format!("{base}/echo"), &options);

    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.headers["content-type"], "application/json");
    let json = echo.json.unwrap();
    assert_eq!(json["n"], 1);
    assert_eq!(json["name"], "widget");
}

#[test]
fn chunked_raw_body_has_no_content_length() {
    let base = spawn_server();
    let options = OptionSet::new().raw(b"streamed body".to_vec()).chunked(true);
    let echo = echo_of(&Session::new(), "POST", &format!("{base}/echo"), &options);

    assert_eq!(echo.body, "streamed body");
    assert!(!echo.headers.contains_key("content-length"));
    assert!(echo.headers["transfer-encoding"].contains("chunked"));
}

#[test]
fn query_is_appended_to_existing_query() {
    let base = spawn_server();
    let options = OptionSet::new().query("b", "x y");
    let echo = echo_of(&Session::new(), "GET", &format!("{base}/echo?a=1"), &options);

    assert_eq!(echo.query["a"], "1");
    assert_eq!(echo.query["b"], "x y");
}

#[test]
fn headers_auth_and_user_agent() {
    let base = spawn_server();
    let session = Session::new();

    let echo_default = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert!(echo_default.headers["user-agent"].starts_with("session-core/"));
    assert!(!echo_default.headers.contains_key("authorization"));

    let options = OptionSet::new()
        .header("User-Agent", "custom/1.0")
        .header("X-Trace", "abc")
        .basic_auth("user", "pass");
    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &options);
    assert_eq!(echo.headers["user-agent"], "custom/1.0");
    assert_eq!(echo.headers["x-trace"], "abc");
    assert_eq!(echo.headers["authorization"], "Basic dXNlcjpwYXNz");
}

#[test]
fn transport_toggles_shape_the_request() {
    let base = spawn_server();
    let options = OptionSet::new()
        .disable_keep_alive(true)
        .disable_compression(true);
    let echo = echo_of(&Session::new(), "GET", &format!("{base}/echo"), &options);

    assert_eq!(echo.headers["connection"], "close");
    assert!(!echo.headers.contains_key("accept-encoding"));
}

#[test]
fn options_from_json_drive_a_request() {
    let base = spawn_server();
    let doc = serde_json::json!({
        "query": {"page": "2"},
        "form": {"a": "1"},
        "headers": {"X-From": "json"},
        "timeout": 5
    });
    let options = OptionSet::from_json(&doc).unwrap();
    let echo = echo_of(&Session::new(), "POST", &format!("{base}/echo"), &options);

    assert_eq!(echo.query["page"], "2");
    assert_eq!(echo.form.unwrap()["a"], "1");
    assert_eq!(echo.headers["x-from"], "json");
}

// --- validation ---

#[test]
fn conflicting_body_variants_never_reach_the_network() {
    let base = spawn_server();
    let session = Session::new();
    let options = OptionSet::new().form("a", "1").json("b", 2);

    let err = session.post(&format!("{base}/echo"), &options).unwrap_err();
    assert!(matches!(err, Error::ParamConflict));
    assert!(session.last_request().is_none());
}

#[test]
fn invalid_method_leaves_session_unchanged() {
    let base = spawn_server();
    let session = Session::new();
    session.get(&format!("{base}/cookies/set?k=v"), &OptionSet::new()).unwrap();
    let sent = session.last_request().unwrap();

    let options = OptionSet::new().timeout_secs(1).proxy("socks5://127.0.0.1:1");
    let err = session.request("FETCH", &format!("{base}/echo"), &options).unwrap_err();
    assert!(matches!(err, Error::InvalidMethod(m) if m == "FETCH"));

    assert_eq!(session.cookies().len(), 1);
    assert!(session.transport_settings().is_default());
    assert_eq!(session.last_request().unwrap().url, sent.url);
}

#[test]
fn malformed_proxy_is_reported_and_restored() {
    let base = spawn_server();
    let session = Session::new();
    let options = OptionSet::new().proxy("::not a proxy::").timeout_secs(1);

    let err = session.get(&format!("{base}/echo"), &options).unwrap_err();
    assert!(matches!(err, Error::ProxyUrl { .. }));
    assert!(session.transport_settings().is_default());

    session.get(&format!("{base}/echo"), &OptionSet::new()).unwrap();
}

// --- transport overrides ---

#[test]
fn overrides_do_not_leak_into_the_next_call() {
    let base = spawn_server();
    let session = Session::new();

    let strict = OptionSet::new().timeout_secs(1).allow_redirects(false);
    let first = session.get(&format!("{base}/redirect/3"), &strict).unwrap();
    assert!(first.status().is_redirection());
    assert!(session.transport_settings().is_default());

    let followed = session.get(&format!("{base}/redirect/3"), &OptionSet::new()).unwrap();
    assert_eq!(followed.status(), 200);
    assert!(followed.url().ends_with("/echo"));

    let slow = session.get(&format!("{base}/delay/1500"), &OptionSet::new()).unwrap();
    assert_eq!(slow.text(), "done");
}

#[test]
fn timeout_aborts_the_call() {
    let base = spawn_server();
    let session = Session::new();

    let options = OptionSet::new().timeout_secs(1);
    let err = session.get(&format!("{base}/delay/3000"), &options).unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
    assert!(session.transport_settings().is_default());
}

#[test]
fn redirects_are_capped() {
    let base = spawn_server();
    let session = Session::new();

    let ok = session.get(&format!("{base}/redirect/10"), &OptionSet::new()).unwrap();
    assert_eq!(ok.status(), 200);

    let err = session.get(&format!("{base}/redirect/11"), &OptionSet::new()).unwrap_err();
    assert!(matches!(err, Error::TooManyRedirects));
}

// --- cookies ---

#[test]
fn cookies_persist_across_calls() {
    let base = spawn_server();
    let session = Session::new();

    session.get(&format!("{base}/cookies/set?k=v"), &OptionSet::new()).unwrap();
    assert_eq!(session.cookies()[0].name(), "k");

    let options = OptionSet::new().cookie("extra", "1");
    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &options);
    assert_eq!(echo.cookies["k"], "v");
    assert_eq!(echo.cookies["extra"], "1");

    let sent = session.last_request().unwrap();
    assert_eq!(sent.header("cookie"), Some("extra=1; k=v"));
    assert_eq!(session.cookies().len(), 1);

    session.clear_cookies();
    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert!(echo.cookies.is_empty());
}

#[test]
fn sessions_do_not_share_cookies() {
    let base = spawn_server();
    let first = Session::new();
    let second = Session::new();

    first.get(&format!("{base}/cookies/set?k=v"), &OptionSet::new()).unwrap();
    let echo = echo_of(&second, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert!(echo.cookies.is_empty());
}

// --- hooks ---

#[test]
fn before_hooks_edit_the_outgoing_request() {
    let base = spawn_server();
    let session = Session::new();
    session
        .register_before_hook(|req| {
            req.headers.insert("x-hooked", HeaderValue::from_static("1"));
            Ok(())
        })
        .unwrap();

    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert_eq!(echo.headers["x-hooked"], "1");
}

#[test]
fn failing_hook_stops_its_list_but_not_the_call() {
    let base = spawn_server();
    let session = Session::new();
    session.register_before_hook(|_| Err("nope".into())).unwrap();
    session
        .register_before_hook(|req| {
            req.headers.insert("x-second", HeaderValue::from_static("1"));
            Ok(())
        })
        .unwrap();

    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert!(!echo.headers.contains_key("x-second"));

    session.unregister_before_hook(0).unwrap();
    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert_eq!(echo.headers["x-second"], "1");
}

#[test]
fn abort_policy_surfaces_hook_errors() {
    let base = spawn_server();
    let config = SessionConfig {
        hook_failure: HookFailurePolicy::Abort,
        ..SessionConfig::default()
    };
    let session = Session::with_config(config);
    session.register_before_hook(|_| Err("denied".into())).unwrap();

    let options = OptionSet::new().timeout_secs(2);
    let err = session.get(&format!("{base}/echo"), &options).unwrap_err();
    assert!(matches!(err, Error::Hook { stage: "before", index: 0, .. }));
    assert!(session.transport_settings().is_default());
    assert!(session.last_request().is_none());

    session.reset_before_hooks();
    session.register_after_hook(|_| Err("late".into())).unwrap();
    let err = session.get(&format!("{base}/echo"), &OptionSet::new()).unwrap_err();
    assert!(matches!(err, Error::Hook { stage: "after", .. }));
}

#[test]
fn aborted_after_hook_keeps_response_cookies() {
    let base = spawn_server();
    let config = SessionConfig {
        hook_failure: HookFailurePolicy::Abort,
        ..SessionConfig::default()
    };
    let session = Session::with_config(config);
    session.register_after_hook(|_| Err("audit failed".into())).unwrap();

    let err = session
        .get(&format!("{base}/cookies/set?k=v"), &OptionSet::new())
        .unwrap_err();
    assert!(matches!(err, Error::Hook { stage: "after", .. }));
    assert_eq!(session.cookies().len(), 1);
    assert_eq!(session.cookies()[0].value(), "v");
    assert!(session.transport_settings().is_default());

    session.reset_after_hooks();
    let echo = echo_of(&session, "GET", &format!("{base}/echo"), &OptionSet::new());
    assert_eq!(echo.cookies["k"], "v");
}

#[test]
fn after_hooks_see_the_raw_response() {
    let base = spawn_server();
    let session = Session::new();
    session
        .register_after_hook(|resp| {
            let status = resp.status().as_u16().to_string();
            resp.headers_mut()
                .insert("x-seen-status", HeaderValue::from_str(&status)?);
            Ok(())
        })
        .unwrap();

    let response = session.get(&format!("{base}/echo"), &OptionSet::new()).unwrap();
    assert_eq!(response.header("x-seen-status"), Some("200"));
}

#[test]
fn calls_on_one_session_are_serialized() {
    let base = spawn_server();
    let session = Arc::new(Session::new());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        session
            .register_before_hook(move |_| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }
    {
        let in_flight = Arc::clone(&in_flight);
        session
            .register_after_hook(move |_| {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            let url = format!("{base}/delay/50");
            std::thread::spawn(move || session.get(&url, &OptionSet::new()).unwrap().status())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 200);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

// --- responses ---

#[test]
fn response_text_can_be_redecoded() {
    let base = spawn_server();
    let mut response = Session::new()
        .get(&format!("{base}/encoding/gbk"), &OptionSet::new())
        .unwrap();
    assert_eq!(response.encoding(), "utf-8");

    let err = response.set_encoding("made-up-charset").unwrap_err();
    assert!(matches!(err, Error::UnrecognizedEncoding(_)));
    let before = response.text().to_string();

    response.set_encoding("gbk").unwrap();
    assert_eq!(response.text(), "你好");
    assert_ne!(before, response.text());
}

#[test]
fn response_can_be_saved_to_disk() {
    let base = spawn_server();
    let response = Session::new()
        .get(&format!("{base}/encoding/gbk"), &OptionSet::new())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("body.txt");
    response.save_to_file(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), echo_server::GBK_NI_HAO);
}

#[test]
fn head_response_has_no_body() {
    let base = spawn_server();
    let response = Session::new().head(&format!("{base}/echo"), &OptionSet::new()).unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.bytes().is_empty());
}

// --- one-shot helpers ---

#[test]
fn one_shot_helpers_use_a_fresh_session() {
    let base = spawn_server();

    let echo: Echo = session_core::patch(&format!("{base}/echo"), &OptionSet::new().raw(b"x".to_vec()))
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.body, "x");

    session_core::get(&format!("{base}/cookies/set?k=v"), &OptionSet::new()).unwrap();
    let echo: Echo = session_core::get(&format!("{base}/echo"), &OptionSet::new())
        .unwrap()
        .json()
        .unwrap();
    assert!(echo.cookies.is_empty());
}
