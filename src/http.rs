use crate::error::AppError;
use crate::fs::{resolve_path, FileDetails, Resolved};
use crate::listing::generate_directory_listing;
use crate::range::{parse_range, RangeSpec};
use crate::response::{create_error_response, get_mime_type, http_date, HttpResponse};
use crate::server::ServerContext;
use crate::stream::copy_range;
use crate::upload::{check_declared_length, receive_upload};
use humansize::{format_size, BINARY};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{self, prelude::*, BufReader, SeekFrom};
use std::net::TcpStream;
use std::path::Path;

const MAX_LINE_LENGTH: u64 = 8 * 1024;
const MAX_HEADERS: usize = 100;
/// How much of an unread upload body is swallowed before an error response,
/// so the peer is not reset while still sending.
const DRAIN_LIMIT: u64 = 1024 * 1024;

/// A parsed request head. Header names are stored lowercase.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn read_line_limited<R: BufRead>(reader: &mut R) -> Result<Option<String>, AppError> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LENGTH)
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with(b"\n") && read as u64 >= MAX_LINE_LENGTH {
        return Err(AppError::BadRequest);
    }
    while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Reads the request line and headers, leaving the reader at the body.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, AppError> {
    let request_line = read_line_limited(reader)?.ok_or(AppError::BadRequest)?;

    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(_version)) if target.starts_with('/') => {
            (method.to_string(), target.to_string())
        }
        _ => return Err(AppError::BadRequest),
    };

    let mut headers = HashMap::new();
    loop {
        let line = read_line_limited(reader)?.ok_or(AppError::BadRequest)?;
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(AppError::BadRequest);
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    Ok(Request {
        method,
        target,
        headers,
    })
}

/// Handles a single client connection.
pub fn handle_client(stream: TcpStream, ctx: &ServerContext, log_prefix: &str) {
    let mut reader = BufReader::new(&stream);
    let mut writer = &stream;
    handle_connection(&mut reader, &mut writer, ctx, log_prefix);
}

/// Serves one request from `reader` and answers on `writer`. Failures become
/// error responses here and nowhere else.
pub fn handle_connection<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    ctx: &ServerContext,
    log_prefix: &str,
) {
    match dispatch(reader, writer, ctx, log_prefix) {
        Ok(()) => {}
        Err(e) if e.is_transport() => {
            debug!("{log_prefix} Connection ended early: {e}");
        }
        Err(e) => {
            warn!("{log_prefix} Request failed: {e}");
            if let Err(send_err) = create_error_response(&e).send(writer, log_prefix) {
                debug!("{log_prefix} Could not deliver error response: {send_err}");
            }
        }
    }
}

fn dispatch<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    ctx: &ServerContext,
    log_prefix: &str,
) -> Result<(), AppError> {
    let request = read_request(reader)?;
    info!("{} {} {}", log_prefix, request.method, request.target);

    match request.method.as_str() {
        "GET" => serve_get(&request, writer, ctx, log_prefix, true),
        "HEAD" => serve_get(&request, writer, ctx, log_prefix, false),
        "POST" => serve_upload(&request, reader, writer, ctx, log_prefix),
        _ => Err(AppError::MethodNotAllowed),
    }
}

fn serve_get<W: Write>(
    request: &Request,
    writer: &mut W,
    ctx: &ServerContext,
    log_prefix: &str,
    with_body: bool,
) -> Result<(), AppError> {
    match resolve_path(&ctx.hosted_root, &request.target)? {
        Resolved::Directory(dir) => serve_directory(request, writer, &dir, ctx, log_prefix, with_body),
        Resolved::File { path, .. } => serve_file(request, writer, &path, ctx, log_prefix, with_body),
        Resolved::NotFound => Err(AppError::NotFound),
    }
}

/// Serves a directory listing as an HTML page.
fn serve_directory<W: Write>(
    request: &Request,
    writer: &mut W,
    dir: &Path,
    ctx: &ServerContext,
    log_prefix: &str,
    with_body: bool,
) -> Result<(), AppError> {
    info!("{} serve_directory started for: '{}'", log_prefix, dir.display());
    let html = generate_directory_listing(
        dir,
        &request.target,
        &ctx.config.template_path,
        &ctx.hosted_root,
    )?;
    let response = HttpResponse::new(200, "OK").with_html_body(html);
    if with_body {
        response.send(writer, log_prefix)?;
    } else {
        response.send_head(writer, log_prefix)?;
    }
    info!("{} serve_directory finished for: '{}'", log_prefix, dir.display());
    Ok(())
}

/// Serves a file, whole or the single range asked for.
fn serve_file<W: Write>(
    request: &Request,
    writer: &mut W,
    path: &Path,
    ctx: &ServerContext,
    log_prefix: &str,
    with_body: bool,
) -> Result<(), AppError> {
    info!("{} serve_file started for: '{}'", log_prefix, path.display());
    let mut details = match FileDetails::open(path.to_path_buf()) {
        Ok(details) => details,
        Err(e) => {
            debug!("{log_prefix} Can't open '{}': {e}", path.display());
            return Err(AppError::NotFound);
        }
    };

    let mut response = match request.header("Range") {
        Some(header) => {
            let range = parse_range(header, details.size)?;
            details
                .file
                .seek(SeekFrom::Start(range.start))
                .map_err(AppError::Filesystem)?;
            HttpResponse::new(206, "Partial Content")
                .add_header("Content-Range", range.content_range())
                .with_content_length(range.content_length())
        }
        None => {
            let length = RangeSpec::full(details.size).map_or(0, |range| range.content_length());
            HttpResponse::new(200, "OK").with_content_length(length)
        }
    };
    response = response
        .add_header("Content-Type", get_mime_type(&details.path))
        .add_header("Accept-Ranges", "bytes");
    if let Ok(modified) = details.file.metadata().and_then(|m| m.modified()) {
        response = response.add_header("Last-Modified", http_date(modified));
    }

    response.send_head(writer, log_prefix)?;
    if with_body {
        let length = response.content_length();
        let copied = copy_range(&mut details.file, writer, length, ctx.config.block_size)?;
        if copied < length {
            warn!(
                "{} '{}' ended after {} of {} bytes",
                log_prefix,
                details.path.display(),
                copied,
                length
            );
        }
    }
    writer.flush()?;

    info!("{} serve_file finished for: '{}'", log_prefix, path.display());
    Ok(())
}

/// Receives a multipart upload into the directory named by the request path.
fn serve_upload<R: BufRead, W: Write>(
    request: &Request,
    reader: &mut R,
    writer: &mut W,
    ctx: &ServerContext,
    log_prefix: &str,
) -> Result<(), AppError> {
    let declared = check_declared_length(request.header("Content-Length"), ctx.config.max_upload_size)?;
    let mut body = reader.by_ref().take(declared);

    let result = store_upload(request, &mut body, ctx, log_prefix);
    if result.is_err() {
        match io::copy(&mut (&mut body).take(DRAIN_LIMIT), &mut io::sink()) {
            Ok(drained) => debug!("{log_prefix} Discarded {drained} unread body bytes"),
            Err(e) => debug!("{log_prefix} Failed to discard request body: {e}"),
        }
    }
    result?;

    HttpResponse::new(200, "OK")
        .with_text_body("Upload successful")
        .send(writer, log_prefix)
}

fn store_upload<R: BufRead>(
    request: &Request,
    body: &mut R,
    ctx: &ServerContext,
    log_prefix: &str,
) -> Result<(), AppError> {
    let content_type = request
        .header("Content-Type")
        .ok_or(AppError::MalformedBody("request is not multipart/form-data"))?;
    let target_dir = match resolve_path(&ctx.hosted_root, &request.target)? {
        Resolved::Directory(dir) => dir,
        _ => return Err(AppError::NotADirectory),
    };

    let outcome = receive_upload(body, content_type, &target_dir)?;
    info!(
        "{} Upload complete: '{}' ({})",
        log_prefix,
        outcome.path.display(),
        format_size(outcome.bytes_written, BINARY)
    );
    Ok(())
}
