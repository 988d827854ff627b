use std::path::{Component, Path};

use serde::Serialize;

/// A parsed `*** Begin Patch` / `*** End Patch` envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchEnvelope {
    pub directives: Vec<FileDirective>,
}

impl PatchEnvelope {
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileDirective {
    AddFile {
        path: String,
        lines: Vec<String>,
    },
    DeleteFile {
        path: String,
    },
    UpdateFile {
        path: String,
        move_to: Option<String>,
        hunks: Vec<Hunk>,
    },
}

impl FileDirective {
    pub fn path(&self) -> &str {
        match self {
            Self::AddFile { path, .. }
            | Self::DeleteFile { path }
            | Self::UpdateFile { path, .. } => path,
        }
    }

    pub fn action(&self) -> DirectiveAction {
        match self {
            Self::AddFile { .. } => DirectiveAction::Add,
            Self::DeleteFile { .. } => DirectiveAction::Delete,
            Self::UpdateFile {
                path,
                move_to: Some(target),
                ..
            } if !same_path(path, target) => DirectiveAction::Move,
            Self::UpdateFile { .. } => DirectiveAction::Update,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveAction {
    Add,
    Update,
    Move,
    Delete,
}

impl DirectiveAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Move => "move",
            Self::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    /// Text following `@@`, trimmed. Empty when the hunk had a bare `@@`.
    pub header: String,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects to find (context and removals), and the lines
    /// that replace them (context and additions).
    pub fn old_new_lines(&self) -> (Vec<String>, Vec<String>) {
        let mut old_lines = Vec::new();
        let mut new_lines = Vec::new();
        for line in &self.lines {
            match line {
                HunkLine::Context(value) => {
                    old_lines.push(value.clone());
                    new_lines.push(value.clone());
                }
                HunkLine::Remove(value) => old_lines.push(value.clone()),
                HunkLine::Add(value) => new_lines.push(value.clone()),
                HunkLine::EndOfFile => {}
            }
        }
        (old_lines, new_lines)
    }

    pub fn is_end_of_file(&self) -> bool {
        self.lines.iter().any(|line| matches!(line, HunkLine::EndOfFile))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
    EndOfFile,
}

/// Compare two directive paths after folding `.` and `..` the way the patch
/// root resolves them.
fn same_path(left: &str, right: &str) -> bool {
    fn fold(raw: &str) -> Vec<Component<'_>> {
        let mut parts: Vec<Component<'_>> = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir if matches!(parts.last(), Some(Component::Normal(_))) => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        parts
    }
    fold(left) == fold(right)
}
