use std::path::{Component, Path, PathBuf};

use crate::DirectiveError;

/// Directory every directive of an envelope is confined to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchRoot {
    root: PathBuf,
}

impl PatchRoot {
    /// Canonicalizes `root`; it must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a directive path to an absolute path inside the root.
    ///
    /// `..` is folded lexically, then the deepest existing ancestor is
    /// canonicalized so a symlink cannot lead outside the root.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, DirectiveError> {
        let violation = |reason: &str| DirectiveError::PathViolation {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(violation("path is empty"));
        }
        if raw.chars().any(|c| matches!(c, '\0' | '\r' | '\n')) {
            return Err(violation("path contains control characters"));
        }

        let candidate = Path::new(raw);
        let mut resolved = if candidate.is_absolute() {
            PathBuf::new()
        } else {
            self.root.clone()
        };
        for component in candidate.components() {
            match component {
                Component::Prefix(prefix) => resolved.push(prefix.as_os_str()),
                Component::RootDir => resolved.push(Component::RootDir.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() || !resolved.starts_with(&self.root) {
                        return Err(violation("path escapes the patch root"));
                    }
                }
                Component::Normal(part) => resolved.push(part),
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(violation("path is outside the patch root"));
        }
        if resolved == self.root {
            return Err(violation("path resolves to the patch root itself"));
        }

        if let Some(existing) = resolved
            .ancestors()
            .find(|ancestor| ancestor.symlink_metadata().is_ok())
        {
            let canonical = std::fs::canonicalize(existing)
                .map_err(|err| DirectiveError::io("resolve", existing, err))?;
            if !canonical.starts_with(&self.root) {
                return Err(violation("path leaves the patch root through a symlink"));
            }
        }

        Ok(resolved)
    }

    /// Path relative to the root, for display.
    pub fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
