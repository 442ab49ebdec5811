//! Declarative patch operations over decoded payload text.

pub mod applicator;
pub mod loader;
pub mod schema;
pub mod structural;
pub mod textual;

pub use applicator::{apply, ApplyError, OperationOutcome};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{Locator, Metadata, Mutation, PatchDefinition, PatchSet, ValidationError};
