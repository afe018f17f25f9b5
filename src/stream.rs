use std::io::{ErrorKind, Read, Write};

/// Copies up to `length` bytes from `source` to `sink` in chunks of at most
/// `block_size` bytes and returns how many bytes were actually copied.
///
/// A zero-byte read ends the copy early without an error; the caller has
/// already promised `length` bytes, so the peer simply sees a short body.
pub fn copy_range<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    length: u64,
    block_size: usize,
) -> std::io::Result<u64> {
    let mut bytes_remaining = length;
    let mut buffer = vec![0; block_size.max(1)];

    while bytes_remaining > 0 {
        let to_read = usize::try_from(bytes_remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let bytes_read = match source.read(&mut buffer[..to_read]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_all(&buffer[..bytes_read])?;
        bytes_remaining -= bytes_read as u64;
    }

    Ok(length - bytes_remaining)
}
