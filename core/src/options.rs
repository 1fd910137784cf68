//! Per-call request options.
//!
//! # Design
//! `OptionSet` is a plain value: the session reads it and never changes it.
//! Maps are string-typed, so a mistyped header or query value is a compile
//! error rather than a runtime one. The body variants live in four separate
//! fields so that callers can populate them freely; `body()` is the single
//! place that enforces "at most one" and hands the builder a `Body` view.
//!
//! Options can also be decoded from a JSON document with
//! [`OptionSet::from_json`], which checks every value's type once at
//! construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub(crate) const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Where the bytes of an uploaded file come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Inline(Vec<u8>),
    Path(PathBuf),
}

/// A file sent as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub source: FileSource,
    pub filename: String,
    /// Defaults to `application/octet-stream` when unset.
    pub mime_type: Option<String>,
    /// Extra text fields sent next to the file part.
    pub fields: BTreeMap<String, String>,
}

impl FilePart {
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: FileSource::Inline(bytes.into()),
            filename: filename.into(),
            mime_type: None,
            fields: BTreeMap::new(),
        }
    }

    /// Reads the file at `path` when the request is built. The part's
    /// filename is the last path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: FileSource::Path(path),
            filename,
            mime_type: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn content_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }
}

/// One named entry of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text(String),
    File(FilePart),
}

impl From<FilePart> for MultipartField {
    fn from(part: FilePart) -> Self {
        MultipartField::File(part)
    }
}

impl From<String> for MultipartField {
    fn from(text: String) -> Self {
        MultipartField::Text(text)
    }
}

impl From<&str> for MultipartField {
    fn from(text: &str) -> Self {
        MultipartField::Text(text.to_string())
    }
}

/// The validated body of a request, borrowed from its `OptionSet`.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    None,
    Form(&'a BTreeMap<String, String>),
    Raw(&'a [u8]),
    Json(&'a Map<String, Value>),
    Multipart(&'a BTreeMap<String, MultipartField>),
}

/// Declarative configuration for a single request.
#[derive(Debug, Clone)]
pub struct OptionSet {
    pub query: BTreeMap<String, String>,
    /// `application/x-www-form-urlencoded` body.
    pub form: Option<BTreeMap<String, String>>,
    pub raw: Option<Vec<u8>>,
    pub json: Option<Map<String, Value>>,
    /// `multipart/form-data` body.
    pub files: Option<BTreeMap<String, MultipartField>>,
    pub headers: BTreeMap<String, String>,
    /// Cookies attached to this request only.
    pub cookies: BTreeMap<String, String>,
    /// Username to password. Callers are expected to supply one pair; with
    /// several, the last one in key order wins.
    pub basic_auth: BTreeMap<String, String>,
    pub proxy: Option<String>,
    pub allow_redirects: bool,
    /// Overall deadline in seconds, 0 for none.
    pub timeout_secs: u64,
    pub chunked: bool,
    pub disable_keep_alive: bool,
    pub disable_compression: bool,
    pub skip_tls_verify: bool,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            query: BTreeMap::new(),
            form: None,
            raw: None,
            json: None,
            files: None,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            basic_auth: BTreeMap::new(),
            proxy: None,
            allow_redirects: true,
            timeout_secs: 0,
            chunked: false,
            disable_keep_alive: false,
            disable_compression: false,
            skip_tls_verify: false,
        }
    }
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn raw(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(body.into());
        self
    }

    pub fn json(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.json
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a multipart entry, either a [`FilePart`] or a plain text field.
    pub fn file(mut self, name: impl Into<String>, field: impl Into<MultipartField>) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), field.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth.insert(user.into(), password.into());
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn disable_keep_alive(mut self, disable: bool) -> Self {
        self.disable_keep_alive = disable;
        self
    }

    pub fn disable_compression(mut self, disable: bool) -> Self {
        self.disable_compression = disable;
        self
    }

    pub fn skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    fn populated_bodies(&self) -> usize {
        [
            self.form.as_ref().is_some_and(|m| !m.is_empty()),
            self.raw.as_ref().is_some_and(|b| !b.is_empty()),
            self.json.as_ref().is_some_and(|m| !m.is_empty()),
            self.files.as_ref().is_some_and(|m| !m.is_empty()),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }

    /// True when more than one body variant is populated. Empty maps and an
    /// empty raw buffer do not count.
    pub fn is_conflicting(&self) -> bool {
        self.populated_bodies() > 1
    }

    /// The single populated body variant.
    ///
    /// # Errors
    /// `ParamConflict` when more than one variant is populated.
    pub fn body(&self) -> Result<Body<'_>> {
        if self.is_conflicting() {
            return Err(Error::ParamConflict);
        }
        let body = match (&self.form, &self.raw, &self.json, &self.files) {
            (Some(form), _, _, _) if !form.is_empty() => Body::Form(form),
            (_, Some(raw), _, _) if !raw.is_empty() => Body::Raw(raw),
            (_, _, Some(json), _) if !json.is_empty() => Body::Json(json),
            (_, _, _, Some(files)) if !files.is_empty() => Body::Multipart(files),
            _ => Body::None,
        };
        Ok(body)
    }

    /// Decodes options from a JSON object.
    ///
    /// Recognized keys: `query`, `form`, `raw`, `json`, `files`, `headers`,
    /// `cookies`, `auth`, `proxy`, `allow_redirects`, `timeout`, `chunked`,
    /// `disable_keep_alive`, `disable_compression`, `skip_tls_verify`.
    /// Unknown keys are ignored. A `files` entry is either a string (text
    /// field) or an object with `content` or `path`, plus optional `filename`,
    /// `mime` and `fields`.
    ///
    /// # Errors
    /// `TypeMismatch` naming the offending key when a value has the wrong
    /// JSON type, `FileInfoInvalid` for malformed `files` entries and
    /// `ParamConflict` when more than one body variant is present.
    pub fn from_json(value: &Value) -> Result<Self> {
        let doc = value.as_object().ok_or_else(|| Error::TypeMismatch {
            key: "options".to_string(),
            found: json_type(value),
        })?;

        let mut options = OptionSet::default();
        for (key, value) in doc {
            match key.as_str() {
                "query" => options.query = string_map(key, value)?,
                "form" => options.form = Some(string_map(key, value)?),
                "raw" => options.raw = Some(string_value(key, value)?.into_bytes()),
                "json" => options.json = Some(object(key, value)?.clone()),
                "files" => options.files = Some(multipart_fields(value)?),
                "headers" => options.headers = string_map(key, value)?,
                "cookies" => options.cookies = string_map(key, value)?,
                "auth" => options.basic_auth = string_map(key, value)?,
                "proxy" => options.proxy = Some(string_value(key, value)?),
                "allow_redirects" => options.allow_redirects = bool_value(key, value)?,
                "timeout" => {
                    options.timeout_secs = value.as_u64().ok_or_else(|| Error::TypeMismatch {
                        key: key.clone(),
                        found: json_type(value),
                    })?;
                }
                "chunked" => options.chunked = bool_value(key, value)?,
                "disable_keep_alive" => options.disable_keep_alive = bool_value(key, value)?,
                "disable_compression" => options.disable_compression = bool_value(key, value)?,
                "skip_tls_verify" => options.skip_tls_verify = bool_value(key, value)?,
                _ => {}
            }
        }

        if options.is_conflicting() {
            return Err(Error::ParamConflict);
        }
        Ok(options)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn object<'a>(key: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| Error::TypeMismatch {
        key: key.to_string(),
        found: json_type(value),
    })
}

fn string_value(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::TypeMismatch {
            key: key.to_string(),
            found: json_type(value),
        })
}

fn bool_value(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| Error::TypeMismatch {
        key: key.to_string(),
        found: json_type(value),
    })
}

fn string_map(section: &str, value: &Value) -> Result<BTreeMap<String, String>> {
    object(section, value)?
        .iter()
        .map(|(k, v)| -> Result<(String, String)> {
            Ok((k.clone(), string_value(&format!("{section}.{k}"), v)?))
        })
        .collect()
}

fn multipart_fields(value: &Value) -> Result<BTreeMap<String, MultipartField>> {
    object("files", value)?
        .iter()
        .map(|(name, entry)| -> Result<(String, MultipartField)> {
            let field = match entry {
                Value::String(text) => MultipartField::Text(text.clone()),
                Value::Object(desc) => MultipartField::File(file_part(name, desc)?),
                _ => {
                    return Err(Error::FileInfoInvalid {
                        field: name.clone(),
                        reason: "expected a string or a file object",
                    })
                }
            };
            Ok((name.clone(), field))
        })
        .collect()
}

fn file_part(name: &str, desc: &Map<String, Value>) -> Result<FilePart> {
    let text = |key: &str| -> Result<Option<String>> {
        desc.get(key)
            .map(|v| string_value(&format!("files.{name}.{key}"), v))
            .transpose()
    };

    let mut part = match (text("content")?, text("path")?) {
        (Some(content), None) => FilePart::from_bytes("", content.into_bytes()),
        (None, Some(path)) => FilePart::from_path(Path::new(&path)),
        (Some(_), Some(_)) => {
            return Err(Error::FileInfoInvalid {
                field: name.to_string(),
                reason: "both content and path given",
            })
        }
        (None, None) => {
            return Err(Error::FileInfoInvalid {
                field: name.to_string(),
                reason: "neither content nor path given",
            })
        }
    };
    if let Some(filename) = text("filename")? {
        part.filename = filename;
    }
    part.mime_type = text("mime")?;
    if let Some(fields) = desc.get("fields") {
        part.fields = string_map(&format!("files.{name}.fields"), fields)?;
    }
    Ok(part)
}
