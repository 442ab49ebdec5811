use crate::patch::schema::{PatchSet, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read patch set from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse patch set TOML: {source}")]
    Toml { source: toml_edit::de::Error },

    #[error("invalid patch set{}: {source}", path_suffix(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

/// Parse and validate a patch set from TOML text.
pub fn load_from_str(input: &str) -> Result<PatchSet, ConfigError> {
    let set: PatchSet =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { source })?;
    set.validate().map_err(|source| ConfigError::Validation {
        path: None,
        source,
    })?;
    Ok(set)
}

/// Parse and validate a patch set from a TOML file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchSet, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| match error {
        ConfigError::Validation { path: None, source } => ConfigError::Validation {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}
