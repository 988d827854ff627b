use serde_json::{Value, json};
use std::path::Path;

use crate::patch::{self, ApplyMode, PatchApplier, PatchRoot};
use crate::{PatchError, PathLocks};

use super::{APPLY_PATCH_TOOL, ToolDefinition, ToolOutput, required_string_argument};

pub const APPLY_PATCH_INSTRUCTIONS: &str = "\
Use the `apply_patch` tool to create, update, move and delete files.
The patch must be wrapped in `*** Begin Patch` and `*** End Patch` lines and
contain one or more file directives:

*** Add File: <path>        every following line starts with `+`
*** Delete File: <path>     no body
*** Update File: <path>     optionally followed by `*** Move to: <new path>`,
                            then one or more hunks

A hunk starts with `@@` (optionally followed by a hint such as a function
name). Inside a hunk, prefix unchanged lines with a space, removed lines with
`-` and added lines with `+`. Include enough unchanged lines to locate the
edit; hunks are matched exactly and in file order. End a hunk with
`*** End of File` to anchor it to the end of the file.

Paths are relative to the working directory and may not leave it.

Example:
*** Begin Patch
*** Update File: src/app.py
@@ def greet():
-    print(\"Hi\")
+    print(\"Hello, world!\")
*** End Patch
";

/// `apply_patch` tool bound to one root directory.
///
/// Every invocation builds its own `PatchApplier`; concurrent invocations are
/// serialized per path through the shared lock table.
#[derive(Clone, Debug)]
pub struct ApplyPatchTool {
    root: PatchRoot,
    mode: ApplyMode,
    locks: PathLocks,
}

impl ApplyPatchTool {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PatchError> {
        let root = PatchRoot::new(root.as_ref()).map_err(|source| PatchError::InvalidRoot {
            path: root.as_ref().to_path_buf(),
            source,
        })?;
        Ok(Self {
            root,
            mode: ApplyMode::default(),
            locks: PathLocks::new(),
        })
    }

    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn root(&self) -> &PatchRoot {
        &self.root
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: APPLY_PATCH_TOOL.to_string(),
            description: "Patch a file. Use this to create, update, or delete files.".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["patch"],
                "properties": {
                    "patch": {
                        "type": "string",
                        "description": "Formatted patch code",
                        "default": "*** Begin Patch\n*** End Patch\n"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    pub fn instructions(&self) -> &'static str {
        APPLY_PATCH_INSTRUCTIONS
    }

    /// Run one tool call. Failures are rendered into the output text.
    pub fn invoke(&self, arguments: &str) -> ToolOutput {
        let envelope = match extract_patch(arguments)
            .and_then(|text| patch::parse_patch(&text).map_err(PatchError::from))
        {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(%error, "rejected apply_patch call");
                return ToolOutput::error(format!("Error applying patch: {error}"));
            }
        };

        let report = PatchApplier::new(self.root.clone())
            .with_mode(self.mode)
            .with_locks(self.locks.clone())
            .apply(envelope);
        if report.is_success() {
            ToolOutput::success(report.summary())
        } else {
            ToolOutput::error(report.summary())
        }
    }
}

/// Pull the patch text out of raw tool arguments.
///
/// Models send either the bare patch or a JSON object; for objects the
/// `patch` member wins, otherwise a lone string member is used.
pub fn extract_patch(arguments: &str) -> Result<String, PatchError> {
    let trimmed = arguments.trim_start();
    if !trimmed.starts_with('{') {
        return Ok(arguments.to_string());
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|error| PatchError::InvalidArguments(format!("error parsing JSON: {error}")))?;
    let Some(object) = value.as_object() else {
        return Err(PatchError::InvalidArguments(
            "expected a JSON object".to_string(),
        ));
    };
    if object.contains_key("patch") {
        return required_string_argument(&value, "patch");
    }
    match object.values().collect::<Vec<_>>().as_slice() {
        [Value::String(text)] => Ok(text.clone()),
        _ => Err(PatchError::InvalidArguments(
            "missing required argument 'patch'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extract_patch_accepts_raw_text_and_json_wrappers() {
        let raw = "*** Begin Patch\n*** Delete File: a\n*** End Patch";
        assert_eq!(extract_patch(raw).expect("raw"), raw);

        let wrapped = json!({ "patch": raw }).to_string();
        assert_eq!(extract_patch(&wrapped).expect("patch key"), raw);

        let single = json!({ "input": raw }).to_string();
        assert_eq!(extract_patch(&single).expect("single member"), raw);
    }

    #[test]
    fn extract_patch_rejects_malformed_json() {
        let err = extract_patch("{not json").expect_err("malformed json should fail");
        assert!(err.to_string().contains("error parsing JSON"));

        let err = extract_patch(r#"{"patch": 3}"#).expect_err("non-string patch should fail");
        assert!(err.to_string().contains("must be a string"));

        let err = extract_patch(r#"{"a": "x", "b": "y"}"#).expect_err("ambiguous object");
        assert!(err.to_string().contains("missing required argument 'patch'"));
    }

    #[test]
    fn definition_requires_patch_string() {
        let dir = tempdir().expect("temp dir should be created");
        let tool = ApplyPatchTool::new(dir.path()).expect("tool should build");
        let definition = tool.definition();
        assert_eq!(definition.name, APPLY_PATCH_TOOL);
        assert_eq!(definition.parameters["required"][0], "patch");
        assert_eq!(definition.parameters["properties"]["patch"]["type"], "string");
        assert!(tool.instructions().contains("*** Begin Patch"));
    }

    #[test]
    fn invoke_applies_patch_and_summarizes() {
        let dir = tempdir().expect("temp dir should be created");
        let tool = ApplyPatchTool::new(dir.path()).expect("tool should build");
        let arguments = json!({
            "patch": "*** Begin Patch\n*** Add File: note.txt\n+hello\n*** End Patch"
        })
        .to_string();

        let output = tool.invoke(&arguments);
        assert!(!output.is_error, "{}", output.text);
        assert_eq!(output.text, "Applied patch:\nA note.txt");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("note.txt")).expect("note should exist"),
            "hello\n"
        );
    }

    #[test]
    fn invoke_reports_parse_errors_without_touching_disk() {
        let dir = tempdir().expect("temp dir should be created");
        let tool = ApplyPatchTool::new(dir.path()).expect("tool should build");
        let output = tool.invoke(
            "*** Begin Patch\n*** Add File: a.txt\n+x\n*** Update File: b.txt\nnot-a-hunk\n*** End Patch",
        );
        assert!(output.is_error);
        assert!(output.text.starts_with("Error applying patch:"));
        assert!(output.text.contains("invalid hunk header"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn invoke_marks_directive_failures_as_errors() {
        let dir = tempdir().expect("temp dir should be created");
        let tool = ApplyPatchTool::new(dir.path()).expect("tool should build");
        let output = tool.invoke("*** Begin Patch\n*** Delete File: missing.txt\n*** End Patch");
        assert!(output.is_error);
        assert!(output.text.contains("file not found: 'missing.txt'"));
    }

    #[test]
    fn new_rejects_missing_root() {
        let dir = tempdir().expect("temp dir should be created");
        let err = ApplyPatchTool::new(dir.path().join("absent")).expect_err("root must exist");
        assert!(matches!(err, PatchError::InvalidRoot { .. }));
    }
}
