use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Shared table of paths currently being patched.
///
/// Appliers holding the same `PathLocks` never touch a common path at the
/// same time. A caller acquires every path of its envelope at once, so two
/// requests cannot deadlock by taking overlapping sets in different orders.
#[derive(Clone, Default)]
pub struct PathLocks {
    shared: Arc<(Mutex<HashSet<PathBuf>>, Condvar)>,
}

impl fmt::Debug for PathLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathLocks")
            .field("held", &self.held_count())
            .finish()
    }
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until none of `paths` is held, then hold all of them.
    pub fn acquire(&self, paths: impl IntoIterator<Item = PathBuf>) -> PathLockGuard {
        let paths = lock_keys(paths);
        let (held, released) = &*self.shared;
        let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
        while paths.iter().any(|path| held.contains(path)) {
            tracing::debug!(paths = paths.len(), "waiting for patch path locks");
            held = released.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(paths.iter().cloned());
        PathLockGuard {
            shared: Arc::clone(&self.shared),
            paths,
        }
    }

    /// Hold all of `paths` if none is currently held.
    pub fn try_acquire(&self, paths: impl IntoIterator<Item = PathBuf>) -> Option<PathLockGuard> {
        let paths = lock_keys(paths);
        let (held, _) = &*self.shared;
        let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
        if paths.iter().any(|path| held.contains(path)) {
            return None;
        }
        held.extend(paths.iter().cloned());
        Some(PathLockGuard {
            shared: Arc::clone(&self.shared),
            paths,
        })
    }

    pub fn held_count(&self) -> usize {
        let (held, _) = &*self.shared;
        held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn lock_keys(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut keys: Vec<PathBuf> = paths.into_iter().map(lock_key).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Canonical parent directory joined with the file name, so every spelling
/// of a path through symlinked directories maps to one key. The final
/// component stays unresolved: a write replaces the entry itself.
fn lock_key(path: PathBuf) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path;
    };
    let mut pending = vec![name.to_os_string()];
    for ancestor in parent.ancestors() {
        if let Ok(canonical) = std::fs::canonicalize(ancestor) {
            return pending.into_iter().rev().fold(canonical, |key, part| key.join(part));
        }
        match ancestor.file_name() {
            Some(part) => pending.push(part.to_os_string()),
            None => break,
        }
    }
    path
}

/// Releases its paths on drop.
#[must_use = "path locks are released as soon as the guard is dropped"]
pub struct PathLockGuard {
    shared: Arc<(Mutex<HashSet<PathBuf>>, Condvar)>,
    paths: Vec<PathBuf>,
}

impl PathLockGuard {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        let (held, released) = &*self.shared;
        let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
        for path in &self.paths {
            held.remove(path);
        }
        released.notify_all();
    }
}
