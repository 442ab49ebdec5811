//! Parameter value encoding for Omnisphere-style payloads.
//!
//! Float parameters are stored as big-endian IEEE-754 float32 hex strings
//! (8 lowercase hex chars). Zero is the one exception: the host writes the
//! literal string `"0"` and treats `"00000000"` differently, so the short
//! form must be reproduced exactly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValueError {
    #[error("invalid float hex string {0:?}: expected \"0\" or 8 hex chars")]
    InvalidHex(String),
}

/// A patch value: literal attribute text, or a float to be hex-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Float(f32),
}

impl ParamValue {
    /// Render the value as it appears inside an attribute.
    pub fn render(&self) -> String {
        match self {
            ParamValue::Text(text) => text.clone(),
            ParamValue::Float(value) => float_to_hex(*value),
        }
    }
}

/// Encode a float32 as a big-endian hex string.
///
/// Zero (positive or negative) serializes as `"0"`, not `"00000000"`.
pub fn float_to_hex(value: f32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let bytes = value.to_be_bytes();
    let mut hex = String::with_capacity(8);
    for byte in bytes {
        use std::fmt::Write;
        write!(hex, "{byte:02x}").expect("writing to String cannot fail");
    }
    hex
}

/// Decode an attribute value in either the `"0"` or 8-hex-char form.
pub fn hex_to_float(hex: &str) -> Result<f32, ValueError> {
    if hex == "0" {
        return Ok(0.0);
    }
    if hex.len() != 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValueError::InvalidHex(hex.to_string()));
    }
    let bits = u32::from_str_radix(hex, 16).map_err(|_| ValueError::InvalidHex(hex.to_string()))?;
    Ok(f32::from_bits(bits))
}
