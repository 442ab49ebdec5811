//! Preset Patcher: inspection, conversion, and batch editing of music
//! production preset files.
//!
//! Two container families are supported: gzip-wrapped XML (Ableton Live
//! `.adg` / `.adv` racks and device presets) and plist containers holding
//! base64-encoded XML payloads (AU `.aupreset`, as written by Omnisphere).
//!
//! # Architecture
//!
//! All mutations compile down to a single primitive: [`SpanEdit`], a verified
//! byte-span replacement on the decoded payload text. Intelligence lives in
//! span acquisition (element-path navigation, regex matching), not in the
//! application logic. Because mutations never round-trip the document through
//! a tree serializer, every byte outside an edited span survives unchanged,
//! and the host applications re-open the results without complaint.
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Idempotent operations: re-running a patch set is a no-op
//! - Batch runs isolate per-file failures
//!
//! # Example
//!
//! ```no_run
//! use preset_patcher::codec::{Container, DEFAULT_PAYLOAD_KEY};
//! use preset_patcher::patch::{apply, load_from_path};
//! use std::path::Path;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let patches = load_from_path(Path::new("patches/pitchbend.toml"))?;
//! let container = Container::open("Kick.adg", None, DEFAULT_PAYLOAD_KEY)?;
//! let payload = container.payload()?;
//!
//! let (modified, outcomes) = apply(&payload, &patches.patches)?;
//! container.write_with_payload(&modified, Path::new("Kick.adg"))?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod codec;
pub mod edit;
pub mod patch;
pub mod value;

// Re-exports
pub use batch::{BatchError, BatchOptions, BatchReport, FileOutcome, FileStatus, OutputMode};
pub use codec::{Container, ContainerKind, FormatError, DEFAULT_PAYLOAD_KEY};
pub use edit::{EditError, EditVerification, SpanEdit, SpanOutcome};
pub use patch::{
    apply, load_from_path, load_from_str, ApplyError, ConfigError, Locator, Mutation,
    OperationOutcome, PatchDefinition, PatchSet,
};
pub use value::{float_to_hex, hex_to_float, ParamValue, ValueError};
