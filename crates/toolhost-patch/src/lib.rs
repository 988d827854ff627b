//! Structured text patches for tool-hosting servers.
//!
//! An envelope of add/update/delete directives is parsed with
//! [`parse_patch`] and applied under a root directory with [`PatchApplier`],
//! which reports the outcome of every directive. [`ApplyPatchTool`] wraps both
//! for a model-facing `apply_patch` tool.

pub mod errors;
pub mod locks;
pub mod patch;
pub mod tools;

pub use errors::*;
pub use locks::*;
pub use patch::*;
pub use tools::*;
