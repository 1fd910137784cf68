//! Turns an `OptionSet` into a `PreparedRequest`.
//!
//! # Design
//! `build_request` is pure apart from reading multipart source files: it
//! never touches the transport or any session state. Every validation error
//! (body conflict, bad file info, bad header) therefore surfaces before the
//! session configures its client.

use std::collections::BTreeMap;
use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::form_urlencoded;
use url::Url;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, PreparedRequest};
use crate::multipart::MultipartWriter;
use crate::options::{Body, FilePart, FileSource, MultipartField, OptionSet};

/// Builds the wire request for `method url` from `options`.
///
/// Explicit `options.headers` are applied after the body's content type and
/// the default `User-Agent`, so they win over both.
///
/// # Errors
/// `ParamConflict`, `FileInfoInvalid`, `Url`, `HeaderName`/`HeaderValue`,
/// `Json`, and `Io` when a multipart source file cannot be read.
pub fn build_request(
    method: HttpMethod,
    url: &str,
    options: &OptionSet,
    config: &SessionConfig,
) -> Result<PreparedRequest> {
    let body = options.body()?;

    let mut url = Url::parse(url)?;
    if !options.query.is_empty() {
        append_query(&mut url, &options.query);
    }

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

    let encoded = encode_body(body)?;
    if let Some(content_type) = &encoded.content_type {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type)?);
    }
    if options.disable_keep_alive {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }

    for (name, value) in &options.headers {
        headers.insert(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(value)?);
    }

    for (user, password) in &options.basic_auth {
        let credentials = STANDARD.encode(format!("{user}:{password}"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {credentials}"))?,
        );
    }

    let mut request = PreparedRequest {
        method,
        url: url.into(),
        headers,
        body: encoded.bytes,
        chunked: options.chunked,
    };
    request.append_cookies(options.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    Ok(request)
}

/// Appends percent-encoded pairs to the URL's query, after any query the URL
/// already carries.
fn append_query(url: &mut Url, pairs: &BTreeMap<String, String>) {
    let extra = encode_pairs(pairs);
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{extra}"),
        _ => extra,
    };
    url.set_query(Some(&query));
}

fn encode_pairs(pairs: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

struct EncodedBody {
    bytes: Option<Vec<u8>>,
    content_type: Option<String>,
}

fn encode_body(body: Body<'_>) -> Result<EncodedBody> {
    let encoded = match body {
        Body::None => EncodedBody {
            bytes: None,
            content_type: None,
        },
        Body::Form(pairs) => EncodedBody {
            bytes: Some(encode_pairs(pairs).into_bytes()),
            content_type: Some("application/x-www-form-urlencoded".to_string()),
        },
        Body::Raw(bytes) => EncodedBody {
            bytes: Some(bytes.to_vec()),
            content_type: None,
        },
        Body::Json(map) => EncodedBody {
            bytes: Some(serde_json::to_vec(map)?),
            content_type: Some("application/json".to_string()),
        },
        Body::Multipart(fields) => {
            let mut writer = MultipartWriter::new();
            for (name, field) in fields {
                match field {
                    MultipartField::Text(value) => writer.write_field(name, value),
                    MultipartField::File(part) => write_file_part(&mut writer, name, part)?,
                }
            }
            let content_type = writer.content_type();
            EncodedBody {
                bytes: Some(writer.finish()),
                content_type: Some(content_type),
            }
        }
    };
    Ok(encoded)
}

fn write_file_part(writer: &mut MultipartWriter, name: &str, part: &FilePart) -> Result<()> {
    let invalid = |reason| Error::FileInfoInvalid {
        field: name.to_string(),
        reason,
    };
    if part.filename.is_empty() {
        return Err(invalid("missing filename"));
    }

    let content = match &part.source {
        FileSource::Inline(bytes) if bytes.is_empty() => return Err(invalid("empty file content")),
        FileSource::Inline(bytes) => bytes.clone(),
        FileSource::Path(path) if path.as_os_str().is_empty() => {
            return Err(invalid("empty file path"))
        }
        FileSource::Path(path) => fs::read(path)?,
    };

    writer.write_file(name, &part.filename, part.content_type(), &content);
    for (field, value) in &part.fields {
        writer.write_field(field, value);
    }
    Ok(())
}
