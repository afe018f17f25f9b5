//! Line-oriented multipart/form-data upload receiver.
//!
//! Only the first part of the body is read and it must carry a filename.
//! The part content is streamed to disk one line at a time. Because the CRLF
//! in front of the closing boundary belongs to the delimiter and not to the
//! file, the last content line is held back in `pending` until the line after
//! it is known.

use crate::error::AppError;
use log::debug;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Longest line read in one go. Longer lines are split into several chunks,
/// which keeps memory bounded for binary content without newlines.
const LINE_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ExpectBoundary,
    ExpectDisposition,
    ExpectBlankLine,
    StreamingBody,
    Finished,
}

/// Where an upload ended up.
#[derive(Debug)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Checks a declared `Content-Length` against the upload ceiling. Must run
/// before any body byte is read.
pub fn check_declared_length(header: Option<&str>, max_upload_size: u64) -> Result<u64, AppError> {
    let length = header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or(AppError::MissingContentLength)?;
    if length > max_upload_size {
        return Err(AppError::PayloadTooLarge(length));
    }
    Ok(length)
}

/// Pulls the boundary parameter out of a `multipart/form-data` content type.
pub fn extract_boundary(content_type: &str) -> Result<String, AppError> {
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(AppError::MalformedBody("request is not multipart/form-data"));
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or(AppError::MissingBoundary)
}

/// Reduces the `filename=` attribute of a Content-Disposition line to a bare
/// file name. Directory components sent by the client are discarded.
pub fn extract_filename(disposition: &str) -> Option<String> {
    let start = disposition.find("filename=")? + "filename=".len();
    let rest = disposition[start..].trim_end();
    let raw = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default(),
    };

    let base: String = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let base = base.trim();

    match base {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn strip_line_ending(line: &mut Vec<u8>) {
    if line.ends_with(b"\n") {
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
    }
}

/// State machine over a multipart body. `reader` must end where the request
/// body ends, e.g. a `Take` limited to the declared `Content-Length`.
pub struct MultipartReader<R> {
    reader: R,
    marker: Vec<u8>,
    state: ParseState,
    pending: Option<Vec<u8>>,
}

impl<R: BufRead> MultipartReader<R> {
    pub fn new(reader: R, boundary: &str) -> Self {
        Self {
            reader,
            marker: format!("--{boundary}").into_bytes(),
            state: ParseState::ExpectBoundary,
            pending: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Next line including its terminator, or `None` once the body is used up.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, AppError> {
        let mut line = Vec::new();
        let read = (&mut self.reader)
            .take(LINE_LIMIT)
            .read_until(b'\n', &mut line)?;
        Ok((read > 0).then_some(line))
    }

    fn is_boundary(&self, line: &[u8]) -> bool {
        contains(line, &self.marker)
    }

    /// Consumes the opening boundary and the first part's headers and returns
    /// the sanitized filename.
    pub fn read_part_headers(&mut self) -> Result<String, AppError> {
        let mut filename = None;

        while self.state != ParseState::StreamingBody {
            let line = self
                .read_line()?
                .ok_or(AppError::MalformedBody("body ended inside the part headers"))?;

            match self.state {
                ParseState::ExpectBoundary => {
                    if !self.is_boundary(&line) {
                        return Err(AppError::MalformedBody("content does not begin with boundary"));
                    }
                    self.state = ParseState::ExpectDisposition;
                }
                ParseState::ExpectDisposition => {
                    let name = extract_filename(&String::from_utf8_lossy(&line))
                        .ok_or(AppError::NoFilePart)?;
                    debug!("Multipart file part named '{name}'");
                    filename = Some(name);
                    self.state = ParseState::ExpectBlankLine;
                }
                ParseState::ExpectBlankLine => {
                    if line == b"\r\n" || line == b"\n" {
                        self.state = ParseState::StreamingBody;
                    }
                }
                ParseState::StreamingBody | ParseState::Finished => {
                    return Err(AppError::MalformedBody("part headers already consumed"));
                }
            }
        }

        filename.ok_or(AppError::NoFilePart)
    }

    /// Streams the part content into `sink` and returns the number of bytes
    /// written. A body that ends before the closing boundary keeps what
    /// arrived; the held-back line is written as is.
    pub fn copy_body<W: Write>(&mut self, sink: &mut W) -> Result<u64, AppError> {
        let mut written = 0u64;

        while self.state == ParseState::StreamingBody {
            let Some(mut line) = self.read_line()? else {
                if let Some(last) = self.pending.take() {
                    sink.write_all(&last).map_err(AppError::DestinationUnwritable)?;
                    written += last.len() as u64;
                }
                debug!("Multipart body ended before the closing boundary");
                self.state = ParseState::Finished;
                break;
            };

            if self.is_boundary(&line) {
                if let Some(mut last) = self.pending.take() {
                    strip_line_ending(&mut last);
                    sink.write_all(&last).map_err(AppError::DestinationUnwritable)?;
                    written += last.len() as u64;
                }
                self.state = ParseState::Finished;
            } else {
                if let Some(mut previous) = self.pending.take() {
                    // A chunk cut between CR and LF: the CR travels with the
                    // next chunk so a delimiter CRLF is stripped as a whole.
                    if previous.ends_with(b"\r") {
                        previous.pop();
                        line.insert(0, b'\r');
                    }
                    sink.write_all(&previous).map_err(AppError::DestinationUnwritable)?;
                    written += previous.len() as u64;
                }
                self.pending = Some(line);
            }
        }

        Ok(written)
    }
}

/// Receives the first file part of a multipart body into `target_dir`.
///
/// An existing file of the same name is overwritten. A body cut off before
/// its closing boundary leaves the bytes received so far; the file is only
/// removed again when reading or writing fails with an error.
pub fn receive_upload<R: BufRead>(
    body: R,
    content_type: &str,
    target_dir: &Path,
) -> Result<UploadOutcome, AppError> {
    let boundary = extract_boundary(content_type)?;
    let mut parser = MultipartReader::new(body, &boundary);
    let filename = parser.read_part_headers()?;

    let path = target_dir.join(&filename);
    let file = File::create(&path).map_err(AppError::DestinationUnwritable)?;
    let mut sink = BufWriter::new(file);

    let result = parser
        .copy_body(&mut sink)
        .and_then(|written| sink.flush().map(|()| written).map_err(AppError::DestinationUnwritable));
    drop(sink);

    match result {
        Ok(bytes_written) => Ok(UploadOutcome {
            path,
            bytes_written,
        }),
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&path) {
                debug!("Could not remove partial upload '{}': {remove_err}", path.display());
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";
    const CONTENT_TYPE: &str = "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW";

    fn body(filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    #[test]
    fn test_round_trip_keeps_inner_crlf() {
        let dir = tempdir().unwrap();
        let outcome = receive_upload(
            Cursor::new(body("hello.txt", b"hello\r\nworld")),
            CONTENT_TYPE,
            dir.path(),
        )
        .unwrap();
        assert_eq!(outcome.path, dir.path().join("hello.txt"));
        assert_eq!(outcome.bytes_written, 12);
        assert_eq!(fs::read(&outcome.path).unwrap(), b"hello\r\nworld");
    }

    #[test]
    fn test_trailing_newlines_in_content_survive() {
        let dir = tempdir().unwrap();
        let content = b"line one\nline two\r\n\r\n";
        receive_upload(Cursor::new(body("t.txt", content)), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("t.txt")).unwrap(), content);
    }

    #[test]
    fn test_empty_and_binary_files() {
        let dir = tempdir().unwrap();
        receive_upload(Cursor::new(body("empty.bin", b"")), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("empty.bin")).unwrap(), b"");

        let binary: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        let outcome =
            receive_upload(Cursor::new(body("blob.bin", &binary)), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(outcome.bytes_written, binary.len() as u64);
        assert_eq!(fs::read(dir.path().join("blob.bin")).unwrap(), binary);
    }

    #[test]
    fn test_client_directories_are_discarded() {
        let dir = tempdir().unwrap();
        let outcome = receive_upload(
            Cursor::new(body("../../etc/evil.txt", b"x")),
            CONTENT_TYPE,
            dir.path(),
        )
        .unwrap();
        assert_eq!(outcome.path, dir.path().join("evil.txt"));

        assert_eq!(
            extract_filename(r#"form-data; name="f"; filename="C:\Users\me\report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(extract_filename("form-data; name=\"f\"; filename=plain.txt\r\n").as_deref(), Some("plain.txt"));
        assert_eq!(extract_filename(r#"form-data; name="f"; filename="..""#), None);
        assert_eq!(extract_filename(r#"form-data; name="f"; filename="""#), None);
        assert_eq!(extract_filename(r#"form-data; name="field""#), None);
    }

    #[test]
    fn test_existing_file_is_overwritten() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("same.txt"), b"old content that is longer").unwrap();
        receive_upload(Cursor::new(body("same.txt", b"new")), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("same.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_state_machine_progression() {
        let data = body("s.txt", b"abc");
        let mut parser = MultipartReader::new(Cursor::new(data), BOUNDARY);
        assert_eq!(parser.state(), ParseState::ExpectBoundary);
        assert_eq!(parser.read_part_headers().unwrap(), "s.txt");
        assert_eq!(parser.state(), ParseState::StreamingBody);
        let mut sink = Vec::new();
        assert_eq!(parser.copy_body(&mut sink).unwrap(), 3);
        assert_eq!(parser.state(), ParseState::Finished);
        assert_eq!(sink, b"abc");
    }

    #[test]
    fn test_malformed_bodies() {
        let dir = tempdir().unwrap();

        let no_boundary = b"hello\r\n".to_vec();
        assert!(matches!(
            receive_upload(Cursor::new(no_boundary), CONTENT_TYPE, dir.path()),
            Err(AppError::MalformedBody(_))
        ));

        let no_file = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
        );
        assert!(matches!(
            receive_upload(Cursor::new(no_file.into_bytes()), CONTENT_TYPE, dir.path()),
            Err(AppError::NoFilePart)
        ));

        assert!(matches!(
            receive_upload(Cursor::new(body("a.txt", b"x")), "text/plain", dir.path()),
            Err(AppError::MalformedBody(_))
        ));
        assert!(matches!(
            receive_upload(Cursor::new(body("a.txt", b"x")), "multipart/form-data", dir.path()),
            Err(AppError::MissingBoundary)
        ));
    }

    #[test]
    fn test_truncated_body_keeps_received_content() {
        let dir = tempdir().unwrap();
        let mut data = body("cut.txt", b"first line\r\nsecond line\r\n");
        data.truncate(data.len() - (BOUNDARY.len() + 8));
        let outcome = receive_upload(Cursor::new(data), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(outcome.bytes_written, 25);
        assert_eq!(
            fs::read(dir.path().join("cut.txt")).unwrap(),
            b"first line\r\nsecond line\r\n"
        );

        let data = b"--x\r\nContent-Disposition: form-data; filename=\"a\"\r\n\r\nabc".to_vec();
        let mut parser = MultipartReader::new(Cursor::new(data), "x");
        parser.read_part_headers().unwrap();
        let mut sink = Vec::new();
        assert_eq!(parser.copy_body(&mut sink).unwrap(), 3);
        assert_eq!(parser.state(), ParseState::Finished);
        assert_eq!(sink, b"abc");
    }

    #[test]
    fn test_long_lines_split_at_carriage_return() {
        // Last line lengths that make a chunk end right between CR and LF.
        for len in [65534usize, 65535, 65536, 131071] {
            let content = vec![b'a'; len];
            let mut parser = MultipartReader::new(Cursor::new(body("long.bin", &content)), BOUNDARY);
            parser.read_part_headers().unwrap();
            let mut sink = Vec::new();
            assert_eq!(parser.copy_body(&mut sink).unwrap(), len as u64);
            assert_eq!(sink.len(), len, "length {len}");
            assert!(sink == content, "content of length {len} changed");
        }

        let mut content = b"head\n".to_vec();
        content.extend(vec![b'z'; 65535]);
        content.extend_from_slice(b"\r\nmid\r");
        let dir = tempdir().unwrap();
        receive_upload(Cursor::new(body("mixed.bin", &content)), CONTENT_TYPE, dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("mixed.bin")).unwrap(), content);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no/such/dir");
        assert!(matches!(
            receive_upload(Cursor::new(body("a.txt", b"x")), CONTENT_TYPE, &missing),
            Err(AppError::DestinationUnwritable(_))
        ));
    }

    #[test]
    fn test_declared_length_ceiling() {
        const GIB: u64 = 1024 * 1024 * 1024;
        assert_eq!(check_declared_length(Some("1024"), GIB).unwrap(), 1024);
        assert_eq!(check_declared_length(Some(&GIB.to_string()), GIB).unwrap(), GIB);
        assert!(matches!(
            check_declared_length(Some(&(GIB + 1).to_string()), GIB),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(check_declared_length(None, GIB), Err(AppError::MissingContentLength)));
        assert!(matches!(check_declared_length(Some("lots"), GIB), Err(AppError::MissingContentLength)));
    }

    #[test]
    fn test_extract_boundary_variants() {
        assert_eq!(extract_boundary(CONTENT_TYPE).unwrap(), BOUNDARY);
        assert_eq!(
            extract_boundary("Multipart/Form-Data; charset=utf-8; boundary=\"abc def\"").unwrap(),
            "abc def"
        );
    }
}
