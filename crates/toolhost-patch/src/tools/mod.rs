mod apply_patch;

use serde::Serialize;
use serde_json::Value;

use crate::PatchError;

pub use apply_patch::{APPLY_PATCH_INSTRUCTIONS, ApplyPatchTool, extract_patch};

pub const APPLY_PATCH_TOOL: &str = "apply_patch";

/// Model-facing description of a tool: name, purpose and JSON schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Text handed back to the model after a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

fn required_string_argument(arguments: &Value, key: &str) -> Result<String, PatchError> {
    match arguments.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(PatchError::InvalidArguments(format!(
            "argument '{key}' must be a string"
        ))),
        None => Err(PatchError::InvalidArguments(format!(
            "missing required argument '{key}'"
        ))),
    }
}
