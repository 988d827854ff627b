use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::DirectiveError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryState {
    Missing,
    File,
    Other,
}

#[derive(Debug)]
struct StagedEntry {
    path: PathBuf,
    content: Option<String>,
    owner: usize,
}

/// Pending filesystem changes layered over the disk. Reads see staged
/// content first; nothing reaches the disk before `commit`.
#[derive(Debug, Default)]
pub(crate) struct Stage {
    entries: Vec<StagedEntry>,
    index: HashMap<PathBuf, usize>,
}

#[derive(Debug)]
pub(crate) struct CommitError {
    pub(crate) owner: usize,
    pub(crate) error: DirectiveError,
}

impl Stage {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// State of `path` as the staged changes leave it. A path with staged
    /// files below it is a directory; a path below a staged file cannot be a
    /// file, and nothing exists below a staged removal.
    pub(crate) fn state(&self, path: &Path) -> Result<EntryState, DirectiveError> {
        if self.has_staged_descendants(path) {
            return Ok(EntryState::Other);
        }
        if let Some(&slot) = self.index.get(path) {
            return Ok(match self.entries[slot].content {
                Some(_) => EntryState::File,
                None => EntryState::Missing,
            });
        }
        for ancestor in path.ancestors().skip(1) {
            if let Some(&slot) = self.index.get(ancestor) {
                return Ok(match self.entries[slot].content {
                    Some(_) => EntryState::Other,
                    None => EntryState::Missing,
                });
            }
        }
        disk_state(path)
    }

    fn has_staged_descendants(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| {
            entry.content.is_some() && entry.path != path && entry.path.starts_with(path)
        })
    }

    pub(crate) fn read(&self, path: &Path) -> Result<String, DirectiveError> {
        if let Some(&slot) = self.index.get(path) {
            if let Some(content) = &self.entries[slot].content {
                return Ok(content.clone());
            }
        }
        std::fs::read_to_string(path).map_err(|err| DirectiveError::io("read", path, err))
    }

    pub(crate) fn write(&mut self, path: &Path, content: String, owner: usize) {
        self.set(path, Some(content), owner);
    }

    pub(crate) fn remove(&mut self, path: &Path, owner: usize) {
        self.set(path, None, owner);
    }

    fn set(&mut self, path: &Path, content: Option<String>, owner: usize) {
        match self.index.get(path) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                entry.content = content;
                entry.owner = owner;
            }
            None => {
                self.index.insert(path.to_path_buf(), self.entries.len());
                self.entries.push(StagedEntry {
                    path: path.to_path_buf(),
                    content,
                    owner,
                });
            }
        }
    }

    /// Write every staged entry in staging order. When a write fails, entries
    /// already committed are restored to their captured originals and the
    /// directories the commit created are removed again.
    pub(crate) fn commit(self) -> Result<usize, CommitError> {
        let mut committed: Vec<Committed> = Vec::new();
        for entry in &self.entries {
            let created_dirs = match entry.content {
                Some(_) => missing_parents(&entry.path),
                None => Vec::new(),
            };
            let result = capture_original(&entry.path).and_then(|original| {
                commit_entry(&entry.path, entry.content.as_deref())?;
                Ok(original)
            });
            match result {
                Ok(original) => committed.push(Committed {
                    path: entry.path.clone(),
                    original,
                    created_dirs,
                }),
                Err(error) => {
                    remove_created_dirs(&created_dirs);
                    rollback(committed);
                    return Err(CommitError {
                        owner: entry.owner,
                        error,
                    });
                }
            }
        }
        Ok(committed.len())
    }
}

struct Committed {
    path: PathBuf,
    original: Option<Vec<u8>>,
    /// Parent directories this entry's write had to create, deepest first.
    created_dirs: Vec<PathBuf>,
}

fn disk_state(path: &Path) -> Result<EntryState, DirectiveError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(EntryState::File),
        Ok(_) => Ok(EntryState::Other),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(EntryState::Missing),
        // A regular file sits where a parent directory would have to be.
        Err(err) if err.kind() == ErrorKind::NotADirectory => Ok(EntryState::Other),
        Err(err) => Err(DirectiveError::io("inspect", path, err)),
    }
}

fn capture_original(path: &Path) -> Result<Option<Vec<u8>>, DirectiveError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(DirectiveError::io("read", path, err)),
    }
}

fn commit_entry(path: &Path, content: Option<&str>) -> Result<(), DirectiveError> {
    match content {
        Some(content) => write_atomic(path, content.as_bytes()),
        None => match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed file");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(DirectiveError::io("delete", path, err)),
        },
    }
}

fn missing_parents(path: &Path) -> Vec<PathBuf> {
    path.ancestors()
        .skip(1)
        .take_while(|dir| !dir.as_os_str().is_empty() && dir.symlink_metadata().is_err())
        .map(Path::to_path_buf)
        .collect()
}

fn remove_created_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        match std::fs::remove_dir(dir) {
            Ok(()) => tracing::debug!(path = %dir.display(), "removed created directory"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(path = %dir.display(), %error, "failed to remove created directory")
            }
        }
    }
}

fn rollback(committed: Vec<Committed>) {
    for Committed {
        path,
        original,
        created_dirs,
    } in committed.into_iter().rev()
    {
        let restored = match original {
            Some(bytes) => write_atomic(&path, &bytes),
            None => match std::fs::remove_file(&path) {
                Err(err) if err.kind() != ErrorKind::NotFound => {
                    Err(DirectiveError::io("delete", &path, err))
                }
                _ => Ok(()),
            },
        };
        match restored {
            Ok(()) => tracing::info!(path = %path.display(), "rolled back file"),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to roll back file")
            }
        }
        remove_created_dirs(&created_dirs);
    }
}

pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), DirectiveError> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent)
        .map_err(|err| DirectiveError::io("create directories", &parent, err))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("patch");
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let written = std::fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .map_err(|err| DirectiveError::io("write", &temp_path, err))
        .and_then(|()| {
            std::fs::rename(&temp_path, path).map_err(|err| DirectiveError::io("rename", path, err))
        });
    if written.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    } else {
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote file");
    }
    written
}
