//! Byte-range parsing for partial downloads.
//!
//! Only a single `bytes=` range is honored; anything after the first comma is
//! ignored. A missing start means offset zero (the `-N` suffix form is not
//! special-cased) and a missing or oversized end is clamped to the last byte.

use crate::error::AppError;

/// A satisfiable byte range against a file of `total_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

impl RangeSpec {
    /// The full file as a range. `None` for an empty file, which has no last byte.
    pub fn full(total_size: u64) -> Option<Self> {
        total_size.checked_sub(1).map(|end| RangeSpec {
            start: 0,
            end,
            total_size,
        })
    }

    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

/// Parses a `Range` header value against a known file size.
///
/// Returns `MalformedRange` when the header is not a `bytes=` range with
/// integer bounds and `RangeNotSatisfiable` when the clamped range is empty
/// or starts past the end of the file.
pub fn parse_range(header: &str, total_size: u64) -> Result<RangeSpec, AppError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(AppError::MalformedRange)?;
    let first = spec.split(',').next().unwrap_or_default();
    let (start_str, end_str) = first.split_once('-').ok_or(AppError::MalformedRange)?;

    let start = parse_bound(start_str)?.unwrap_or(0);
    let last_byte = total_size
        .checked_sub(1)
        .ok_or(AppError::RangeNotSatisfiable(total_size))?;
    let end = parse_bound(end_str)?.map_or(last_byte, |end| end.min(last_byte));

    if start > end {
        return Err(AppError::RangeNotSatisfiable(total_size));
    }

    Ok(RangeSpec {
        start,
        end,
        total_size,
    })
}

fn parse_bound(raw: &str) -> Result<Option<u64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| AppError::MalformedRange)
}
