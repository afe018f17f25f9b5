use std::borrow::Cow;
use std::ffi::{OsStr, OsString};

// Drops the query string and fragment from a request target, leaving the path. 🗺️
pub fn strip_query(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    &target[..end]
}

// Percent-decodes a URL path into raw bytes. Invalid escapes are kept as-is.
pub fn percent_decode(path: &str) -> Cow<'_, [u8]> {
    urlencoding::decode_binary(path.as_bytes())
}

// Percent-encodes raw name bytes so they form one valid URL path segment. 🌐
pub fn percent_encode(name: &[u8]) -> String {
    urlencoding::encode_binary(name).into_owned()
}

/// Simple HTML entity escaping
pub fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(unix)]
pub fn os_str_from_bytes(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
pub fn os_str_from_bytes(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

// Raw bytes of a file name; lossless on unix, where names need not be UTF-8.
#[cfg(unix)]
pub fn os_str_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(not(unix))]
pub fn os_str_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}
