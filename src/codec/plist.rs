//! aupreset plist payload transcoding.
//!
//! An `.aupreset` is an XML property list whose top-level `dict` carries one
//! or more base64-encoded XML payloads under `data0`, `data1`, ... keys.
//! Rather than round-tripping the plist through a tree (which reorders and
//! reformats unrelated regions), the payload `<data>` span is located
//! textually and spliced, so every other byte of the container is preserved
//! exactly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use std::ops::Range;
use thiserror::Error;

/// Base64 line width observed in host-written aupresets.
const WRAP_WIDTH: usize = 68;

#[derive(Error, Debug)]
pub enum PlistError {
    #[error("payload key {0:?} not found")]
    MissingKey(String),

    #[error("payload under key {0:?} is empty")]
    EmptyPayload(String),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded payload is not valid UTF-8")]
    Utf8,
}

/// Span of the base64 content for `key`, plus the indentation of its
/// `<data>` line.
fn data_span(container: &str, key: &str) -> Option<(Range<usize>, String)> {
    let pattern = format!(
        r"(?s)<key>\s*{}\s*</key>\s*<data>(.*?)</data>",
        regex::escape(key)
    );
    let re = Regex::new(&pattern).expect("escaped key always yields a valid pattern");
    let caps = re.captures(container)?;
    let content = caps.get(1)?;

    let data_open = content.start() - "<data>".len();
    let line_start = container[..data_open].rfind('\n').map_or(0, |i| i + 1);
    let line_prefix = &container[line_start..data_open];
    let indent = if line_prefix.chars().all(|c| c == ' ' || c == '\t') {
        line_prefix.to_string()
    } else {
        String::new()
    };

    Some((content.range(), indent))
}

/// Decode the base64 payload stored under `key`.
pub fn extract_payload(container: &str, key: &str) -> Result<String, PlistError> {
    let (span, _) = data_span(container, key).ok_or_else(|| PlistError::MissingKey(key.into()))?;

    let stripped: String = container[span]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if stripped.is_empty() {
        return Err(PlistError::EmptyPayload(key.into()));
    }

    let bytes = BASE64.decode(stripped.as_bytes())?;
    String::from_utf8(bytes).map_err(|_| PlistError::Utf8)
}

/// Re-encode `payload` under `key`, leaving every byte outside the `<data>`
/// span untouched. The base64 is wrapped at 68 columns with the `<data>`
/// line's indentation.
pub fn replace_payload(container: &str, key: &str, payload: &str) -> Result<String, PlistError> {
    let (span, indent) =
        data_span(container, key).ok_or_else(|| PlistError::MissingKey(key.into()))?;

    let encoded = BASE64.encode(payload.as_bytes());
    let mut block = String::with_capacity(encoded.len() + encoded.len() / WRAP_WIDTH * 8 + 16);
    block.push('\n');
    for chunk in encoded.as_bytes().chunks(WRAP_WIDTH) {
        block.push_str(&indent);
        // chunks of ASCII base64 are always valid UTF-8
        block.push_str(std::str::from_utf8(chunk).expect("base64 output is ASCII"));
        block.push('\n');
    }
    block.push_str(&indent);

    let mut result = String::with_capacity(container.len() + block.len());
    result.push_str(&container[..span.start]);
    result.push_str(&block);
    result.push_str(&container[span.end..]);
    Ok(result)
}
