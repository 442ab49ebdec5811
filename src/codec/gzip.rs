//! gzip payload transcoding.
//!
//! Live writes its containers with mtime 0, no embedded filename, and
//! default deflate compression; matching that output keeps re-encoded files
//! byte-comparable across runs.

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::io::{Read, Write};

/// Decompress a gzip stream to raw bytes.
pub fn decompress(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(raw);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Compress a text payload into a gzip stream.
pub fn compress(payload: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new().mtime(0).write(Vec::new(), Compression::default());
    encoder.write_all(payload.as_bytes())?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = "<?xml version=\"1.0\"?>\n<Ableton>\n\t<GroupDevicePreset />\n</Ableton>\n";
        let compressed = compress(payload).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, payload.as_bytes());
    }

    #[test]
    fn test_deterministic_output() {
        // mtime is pinned to 0, so the same payload always compresses to the
        // same bytes
        let payload = "<Root />";
        assert_eq!(compress(payload).unwrap(), compress(payload).unwrap());
    }

    #[test]
    fn test_garbage_input_fails() {
        assert!(decompress(b"definitely not a gzip stream").is_err());
    }

    #[test]
    fn test_header_has_no_timestamp() {
        let compressed = compress("<Root />").unwrap();
        // gzip header: magic(2) method(1) flags(1) mtime(4)
        assert_eq!(&compressed[4..8], &[0, 0, 0, 0]);
    }
}
