use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    /// Local filesystem failure before any response byte was written.
    Filesystem(std::io::Error),
    ConfigParse(toml::de::Error),
    ConfigWrite(toml::ser::Error),
    AddrParse(std::net::AddrParseError),
    InvalidConfig(String),
    DirectoryNotFound(String),
    BadRequest,
    ContainmentViolation,
    NotFound,
    ListingForbidden,
    MethodNotAllowed,
    MalformedRange,
    RangeNotSatisfiable(u64),
    MissingContentLength,
    MissingBoundary,
    MalformedBody(&'static str),
    NoFilePart,
    NotADirectory,
    PayloadTooLarge(u64),
    TemplateMissing(String),
    DestinationUnwritable(std::io::Error),
    InternalServerError(String),
}

impl AppError {
    /// Status code and reason phrase sent to the client for this error.
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            AppError::BadRequest
            | AppError::MalformedRange
            | AppError::MissingContentLength
            | AppError::MissingBoundary
            | AppError::MalformedBody(_)
            | AppError::NoFilePart
            | AppError::NotADirectory => (400, "Bad Request"),
            AppError::ContainmentViolation => (403, "Forbidden"),
            AppError::NotFound | AppError::ListingForbidden => (404, "Not Found"),
            AppError::MethodNotAllowed => (405, "Method Not Allowed"),
            AppError::PayloadTooLarge(_) => (413, "Payload Too Large"),
            AppError::RangeNotSatisfiable(_) => (416, "Range Not Satisfiable"),
            _ => (500, "Internal Server Error"),
        }
    }

    /// Transport failures happen after (or while) talking to the peer, so no
    /// response can be sent for them.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Io(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "IO error: {err}"),
            AppError::Filesystem(err) => write!(f, "Filesystem error: {err}"),
            AppError::ConfigParse(err) => write!(f, "Config parse error: {err}"),
            AppError::ConfigWrite(err) => write!(f, "Config write error: {err}"),
            AppError::AddrParse(err) => write!(f, "Address parse error: {err}"),
            AppError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            AppError::DirectoryNotFound(path) => write!(f, "Directory not found: {path}"),
            AppError::BadRequest => write!(f, "Bad request"),
            AppError::ContainmentViolation => write!(f, "Path escapes the hosted directory"),
            AppError::NotFound => write!(f, "File not found"),
            AppError::ListingForbidden => write!(f, "No permission to list directory"),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
            AppError::MalformedRange => write!(f, "Malformed Range header"),
            AppError::RangeNotSatisfiable(size) => {
                write!(f, "Requested range not satisfiable for size {size}")
            }
            AppError::MissingContentLength => write!(f, "Missing or invalid Content-Length"),
            AppError::MissingBoundary => write!(f, "Content-Type lacks a multipart boundary"),
            AppError::MalformedBody(why) => write!(f, "Malformed multipart body: {why}"),
            AppError::NoFilePart => write!(f, "No file part present"),
            AppError::NotADirectory => write!(f, "Upload target is not a directory"),
            AppError::PayloadTooLarge(len) => write!(f, "Declared length {len} exceeds upload limit"),
            AppError::TemplateMissing(path) => write!(f, "Template file not found: {path}"),
            AppError::DestinationUnwritable(err) => {
                write!(f, "Can't create file to write: {err}")
            }
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::ConfigParse(err)
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::ConfigWrite(err)
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(err: std::net::AddrParseError) -> Self {
        AppError::AddrParse(err)
    }
}

impl std::error::Error for AppError {}
