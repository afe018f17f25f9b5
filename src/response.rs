use crate::error::AppError;
use crate::templates::{get_error_description, render_error_page};
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

pub const SERVER_NAME: &str = concat!("hdl_share/", env!("CARGO_PKG_VERSION"));

/// Native MIME type detection for common file types
pub fn get_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Formats a timestamp as an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Generate error pages using the embedded template
fn generate_error_page(status_code: u16, status_text: &str) -> String {
    let description = get_error_description(status_code);

    render_error_page(status_code, status_text, description).unwrap_or_else(|_| {
        // Fallback if template rendering fails
        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Error {status_code}</title></head>
<body><h1>{status_code}</h1><p>{status_text}</p><a href="/">Back to Files</a></body>
</html>"#
        )
    })
}

/// HTTP response builder. The body is either held in memory or, for file
/// downloads, streamed by the caller after `send_head` with a length fixed
/// up front through `with_content_length`.
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    content_length: Option<u64>,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![
                ("Server".to_string(), SERVER_NAME.to_string()),
                ("Date".to_string(), http_date(SystemTime::now())),
                ("Connection".to_string(), "close".to_string()),
            ],
            body: Vec::new(),
            content_length: None,
        }
    }

    pub fn with_html_body(mut self, body: Vec<u8>) -> Self {
        self.headers.push((
            "Content-Type".to_string(),
            "text/html; charset=utf-8".to_string(),
        ));
        self.body = body;
        self
    }

    pub fn with_text_body(mut self, body: &str) -> Self {
        self.headers.push((
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        ));
        self.body = body.as_bytes().to_vec();
        self
    }

    /// Declare the length of a body the caller writes itself.
    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn add_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn content_length(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }

    /// Write the status line and headers only.
    pub fn send_head<W: Write>(&self, stream: &mut W, log_prefix: &str) -> Result<(), AppError> {
        debug!(
            "{} Sending response - Status: {}, Content-Length: {}",
            log_prefix,
            self.status_code,
            self.content_length()
        );

        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);
        head.push_str(&format!("Content-Length: {}\r\n", self.content_length()));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes()).map_err(|e| {
            error!("{log_prefix} Failed to write response headers: {e}");
            AppError::Io(e)
        })
    }

    /// Write the full response, in-memory body included.
    pub fn send<W: Write>(self, stream: &mut W, log_prefix: &str) -> Result<(), AppError> {
        self.send_head(stream, log_prefix)?;

        if !self.body.is_empty() {
            stream.write_all(&self.body).map_err(|e| {
                error!("{log_prefix} Failed to write response body: {e}");
                AppError::Io(e)
            })?;
        }

        stream.flush().map_err(|e| {
            error!("{log_prefix} Failed to flush response: {e}");
            AppError::Io(e)
        })
    }
}

/// Create the response the client sees for `err`.
pub fn create_error_response(err: &AppError) -> HttpResponse {
    let (status_code, status_text) = err.status();
    let error_page = generate_error_page(status_code, status_text);
    let response = HttpResponse::new(status_code, status_text).with_html_body(error_page.into_bytes());

    match err {
        AppError::MethodNotAllowed => response.add_header("Allow", "GET, HEAD, POST"),
        AppError::RangeNotSatisfiable(size) => {
            response.add_header("Content-Range", format!("bytes */{size}"))
        }
        _ => response,
    }
}
