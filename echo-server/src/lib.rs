//! Echo server used to exercise the session client over real HTTP.
//!
//! Every endpoint reports back what it received, or produces one specific
//! response shape (cookies, redirects, slow replies, non-UTF-8 bodies).

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, Method, Uri,
    },
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{any, get, post},
    Json, Router,
};
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;

/// "你好" encoded as GBK.
pub const GBK_NI_HAO: [u8; 4] = [0xC4, 0xE3, 0xBA, 0xC3];

/// What `/echo` saw of a request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Lower-cased header names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// Raw body, lossily decoded as UTF-8.
    pub body: String,
    /// Set when the body was sent as `application/x-www-form-urlencoded`.
    #[serde(default)]
    pub form: Option<BTreeMap<String, String>>,
    /// Set when the body was sent as `application/json`.
    #[serde(default)]
    pub json: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MultipartDump {
    pub fields: BTreeMap<String, String>,
    pub files: BTreeMap<String, UploadedFile>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/multipart", post(multipart))
        .route("/cookies/set", get(set_cookies))
        .route("/redirect/{n}", get(redirect))
        .route("/delay/{ms}", get(delay))
        .route("/encoding/gbk", get(gbk))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "echo server listening");
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    tracing::debug!(%method, %uri, len = body.len(), "echo");

    let query = uri
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let form = content_type
        .starts_with("application/x-www-form-urlencoded")
        .then(|| serde_urlencoded::from_bytes(&body).ok())
        .flatten();
    let json = content_type
        .starts_with("application/json")
        .then(|| serde_json::from_slice(&body).ok())
        .flatten();

    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers: header_map(&headers),
        cookies: request_cookies(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
        form,
        json,
    })
}

async fn multipart(mut form: Multipart) -> Result<Json<MultipartDump>, MultipartError> {
    let mut dump = MultipartDump::default();
    while let Some(field) = form.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let content = String::from_utf8_lossy(&field.bytes().await?).into_owned();

        match filename {
            Some(filename) => {
                dump.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        content_type,
                        content,
                    },
                );
            }
            None => {
                dump.fields.insert(name, content);
            }
        }
    }
    Ok(Json(dump))
}

/// Sets one cookie per query pair.
async fn set_cookies(Query(pairs): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    let cookies: Vec<_> = pairs
        .iter()
        .map(|(name, value)| (SET_COOKIE, format!("{name}={value}; Path=/")))
        .collect();
    (AppendHeaders(cookies), Json(pairs))
}

/// Redirects `n` times before landing on `/echo`.
async fn redirect(Path(n): Path<u32>) -> Redirect {
    if n <= 1 {
        Redirect::to("/echo")
    } else {
        Redirect::to(&format!("/redirect/{}", n - 1))
    }
}

async fn delay(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}

async fn gbk() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=gbk")], GBK_NI_HAO.to_vec())
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

fn request_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| Cookie::split_parse(line))
        .filter_map(|parsed| parsed.ok())
        .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
        .collect()
}
