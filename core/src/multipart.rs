//! In-memory `multipart/form-data` writer.

use uuid::Uuid;

/// Accumulates parts into a buffer under one generated boundary.
pub(crate) struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartWriter {
    pub(crate) fn new() -> Self {
        Self {
            boundary: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            buf: Vec::new(),
        }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub(crate) fn write_field(&mut self, name: &str, value: &str) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.write_part(&[("Content-Disposition", disposition.as_str())], value.as_bytes());
    }

    pub(crate) fn write_file(&mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(name),
            escape_quotes(filename)
        );
        self.write_part(
            &[("Content-Disposition", disposition.as_str()), ("Content-Type", content_type)],
            content,
        );
    }

    fn write_part(&mut self, headers: &[(&str, &str)], content: &[u8]) {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.buf.extend_from_slice(name.as_bytes());
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(value.as_bytes());
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Writes the closing boundary and returns the encoded body.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }
}

pub(crate) fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
