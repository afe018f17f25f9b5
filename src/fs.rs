use crate::error::AppError;
use crate::utils::{os_str_from_bytes, percent_decode, strip_query};
use log::{debug, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// What a request path points at inside the hosted directory.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    Directory(PathBuf),
    File { path: PathBuf, size: u64 },
    NotFound,
}

pub fn is_directory(path: &Path) -> Result<bool, AppError> {
    Ok(fs::metadata(path)?.is_dir())
}

/// Maps a request target onto a path beneath `root`.
///
/// The query string is dropped, the rest percent-decoded and normalized
/// segment by segment: empty and `.` segments vanish and `..` removes the
/// previous segment but can never climb above `root`.
pub fn translate_path(root: &Path, request_path: &str) -> PathBuf {
    let decoded = percent_decode(strip_query(request_path));

    let mut segments: Vec<&[u8]> = Vec::new();
    for segment in decoded.split(|&b| b == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(os_str_from_bytes(segment));
    }
    path
}

/// Resolves and classifies a request path. `root` must be canonical.
///
/// Existing targets are canonicalized as well, so a symlink pointing out of
/// the hosted directory is reported as a containment violation.
pub fn resolve_path(root: &Path, request_path: &str) -> Result<Resolved, AppError> {
    let path = translate_path(root, request_path);

    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("No servable target at '{}': {e}", path.display());
            return Ok(Resolved::NotFound);
        }
    };

    let canonical = path.canonicalize().map_err(AppError::Filesystem)?;
    if !canonical.starts_with(root) {
        warn!("Potential path traversal attempt: '{request_path}'");
        return Err(AppError::ContainmentViolation);
    }

    if metadata.is_dir() {
        Ok(Resolved::Directory(canonical))
    } else {
        Ok(Resolved::File {
            path: canonical,
            size: metadata.len(),
        })
    }
}

/// Holds details about a file to be streamed.
pub struct FileDetails {
    pub path: PathBuf,
    pub file: File,
    pub size: u64,
}

impl FileDetails {
    pub fn open(path: PathBuf) -> Result<Self, io::Error> {
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(FileDetails { path, file, size })
    }
}
