//! Container codec: reversible transcoding between on-disk preset containers
//! and their editable text payload.
//!
//! Two container variants exist in the wild:
//! - gzip-wrapped UTF-8 XML (Ableton `.adg`, `.adv`, `.als`)
//! - XML property lists whose `dict` holds base64-encoded UTF-8 XML payloads
//!   under `data0`, `data1`, ... keys (AU `.aupreset`)
//!
//! Writes are atomic (tempfile + fsync + rename): on any failure the
//! destination file is never created or modified.

pub mod gzip;
pub mod plist;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use plist::PlistError;

/// Payload key used by Omnisphere aupresets unless overridden.
pub const DEFAULT_PAYLOAD_KEY: &str = "data0";

/// On-disk encoding of a preset container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// gzip stream wrapping UTF-8 XML
    Gzip,
    /// plist with a base64 payload under a `dataN` key
    PlistBase64,
}

impl ContainerKind {
    /// Infer the container kind from a file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "adg" | "adv" | "als" => Some(ContainerKind::Gzip),
            "aupreset" => Some(ContainerKind::PlistBase64),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a valid gzip stream: {source}")]
    Gzip {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("payload of {path} is not valid UTF-8")]
    Utf8 { path: PathBuf },

    #[error("{path}: {source}")]
    Plist { path: PathBuf, source: PlistError },

    #[error("cannot infer container kind from extension of {path}")]
    UnknownExtension { path: PathBuf },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An opened preset container: raw bytes plus the knowledge of how to get
/// the text payload out and back in.
#[derive(Debug, Clone)]
pub struct Container {
    path: PathBuf,
    raw: Vec<u8>,
    kind: ContainerKind,
    payload_key: String,
}

impl Container {
    /// Read a container from disk.
    ///
    /// The kind is inferred from the extension unless `kind` is given;
    /// `payload_key` selects the plist `dataN` entry and is ignored for gzip
    /// containers.
    pub fn open(
        path: impl Into<PathBuf>,
        kind: Option<ContainerKind>,
        payload_key: &str,
    ) -> Result<Self, FormatError> {
        let path = path.into();
        let kind = match kind.or_else(|| ContainerKind::detect(&path)) {
            Some(kind) => kind,
            None => return Err(FormatError::UnknownExtension { path }),
        };
        let raw = fs::read(&path).map_err(|source| FormatError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            raw,
            kind,
            payload_key: payload_key.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Decode the text payload.
    pub fn payload(&self) -> Result<String, FormatError> {
        match self.kind {
            ContainerKind::Gzip => {
                let bytes = gzip::decompress(&self.raw).map_err(|source| FormatError::Gzip {
                    path: self.path.clone(),
                    source,
                })?;
                String::from_utf8(bytes).map_err(|_| FormatError::Utf8 {
                    path: self.path.clone(),
                })
            }
            ContainerKind::PlistBase64 => {
                let text = std::str::from_utf8(&self.raw).map_err(|_| FormatError::Utf8 {
                    path: self.path.clone(),
                })?;
                plist::extract_payload(text, &self.payload_key).map_err(|source| {
                    FormatError::Plist {
                        path: self.path.clone(),
                        source,
                    }
                })
            }
        }
    }

    /// Re-encode `payload` into this container's format and write it to
    /// `dest` atomically.
    ///
    /// For the plist variant, every byte outside the payload `<data>` span is
    /// taken verbatim from the original container.
    pub fn write_with_payload(&self, payload: &str, dest: &Path) -> Result<(), FormatError> {
        let bytes = match self.kind {
            ContainerKind::Gzip => gzip::compress(payload).map_err(|source| FormatError::Write {
                path: dest.to_path_buf(),
                source,
            })?,
            ContainerKind::PlistBase64 => {
                let text = std::str::from_utf8(&self.raw).map_err(|_| FormatError::Utf8 {
                    path: self.path.clone(),
                })?;
                plist::replace_payload(text, &self.payload_key, payload)
                    .map_err(|source| FormatError::Plist {
                        path: self.path.clone(),
                        source,
                    })?
                    .into_bytes()
            }
        };

        atomic_write(dest, &bytes).map_err(|source| FormatError::Write {
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Atomic file write: tempfile in the destination directory + fsync + rename.
///
/// Either the full write succeeds or the destination is untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
