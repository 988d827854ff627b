use std::path::PathBuf;

use serde::Serialize;

use crate::{DirectiveError, PathLocks};

use super::matching::{find_subsequence, find_tail};
use super::path::PatchRoot;
use super::report::{ApplyReport, DirectiveOutcome, DirectiveStatus};
use super::stage::{EntryState, Stage};
use super::types::{DirectiveAction, FileDirective, Hunk, PatchEnvelope};

/// What happens to the rest of an envelope when one directive fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Each directive is committed on its own; failures neither roll back
    /// earlier directives nor stop later ones.
    #[default]
    PerDirective,
    /// Nothing is written unless every directive validates.
    Transactional,
}

/// Applies one envelope under one root. Build a fresh applier per request;
/// share only the `PathLocks` handle between them.
#[derive(Clone, Debug)]
pub struct PatchApplier {
    root: PatchRoot,
    mode: ApplyMode,
    locks: Option<PathLocks>,
}

struct Resolved {
    source: PathBuf,
    target: Option<PathBuf>,
}

impl PatchApplier {
    pub fn new(root: PatchRoot) -> Self {
        Self {
            root,
            mode: ApplyMode::default(),
            locks: None,
        }
    }

    pub fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn root(&self) -> &PatchRoot {
        &self.root
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn apply(&self, envelope: PatchEnvelope) -> ApplyReport {
        let resolved: Vec<Result<Resolved, DirectiveError>> = envelope
            .directives
            .iter()
            .map(|directive| self.resolve(directive))
            .collect();

        // A move whose target resolves to its own source is an in-place edit.
        let actions: Vec<DirectiveAction> = envelope
            .directives
            .iter()
            .zip(&resolved)
            .map(|(directive, paths)| match (directive.action(), paths) {
                (DirectiveAction::Move, Ok(paths)) if paths.target.is_none() => {
                    DirectiveAction::Update
                }
                (action, _) => action,
            })
            .collect();

        let _guard = self.locks.as_ref().map(|locks| {
            let paths = resolved.iter().flatten().flat_map(|paths| {
                std::iter::once(paths.source.clone()).chain(paths.target.clone())
            });
            locks.acquire(paths)
        });

        let outcomes = match self.mode {
            ApplyMode::PerDirective => self.apply_each(&envelope.directives, resolved, &actions),
            ApplyMode::Transactional => self.apply_all(&envelope.directives, resolved, &actions),
        };
        let report = ApplyReport {
            mode: self.mode,
            outcomes,
        };
        tracing::info!(
            mode = ?self.mode,
            directives = report.outcomes.len(),
            applied = report.applied_count(),
            failed = report.failed_count(),
            "applied patch envelope"
        );
        report
    }

    fn resolve(&self, directive: &FileDirective) -> Result<Resolved, DirectiveError> {
        let source = self.root.resolve(directive.path())?;
        let target = match directive {
            FileDirective::UpdateFile {
                move_to: Some(target),
                ..
            } => Some(self.root.resolve(target)?).filter(|target| *target != source),
            _ => None,
        };
        Ok(Resolved { source, target })
    }

    fn apply_each(
        &self,
        directives: &[FileDirective],
        resolved: Vec<Result<Resolved, DirectiveError>>,
        actions: &[DirectiveAction],
    ) -> Vec<DirectiveOutcome> {
        directives
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(index, (directive, paths))| {
                let status = paths
                    .and_then(|paths| {
                        let mut stage = Stage::default();
                        stage_directive(&mut stage, index, directive, &paths)?;
                        stage.commit().map_err(|failure| failure.error)?;
                        Ok(paths)
                    })
                    .map_or_else(DirectiveStatus::failed, |_| DirectiveStatus::Applied);
                self.outcome(index, directive, actions[index], status)
            })
            .collect()
    }

    fn apply_all(
        &self,
        directives: &[FileDirective],
        resolved: Vec<Result<Resolved, DirectiveError>>,
        actions: &[DirectiveAction],
    ) -> Vec<DirectiveOutcome> {
        let mut stage = Stage::default();
        let mut statuses: Vec<DirectiveStatus> = directives
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(index, (directive, paths))| {
                paths
                    .and_then(|paths| stage_directive(&mut stage, index, directive, &paths))
                    .map_or_else(DirectiveStatus::failed, |()| DirectiveStatus::Applied)
            })
            .collect();

        let any_failed = statuses.iter().any(DirectiveStatus::is_failed);
        if any_failed {
            skip_applied(&mut statuses, "not committed: another directive in the patch failed");
        } else if !stage.is_empty() {
            if let Err(failure) = stage.commit() {
                skip_applied(&mut statuses, "rolled back: the patch could not be committed");
                statuses[failure.owner] = DirectiveStatus::failed(failure.error);
            }
        }

        directives
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(index, (directive, status))| {
                self.outcome(index, directive, actions[index], status)
            })
            .collect()
    }

    fn outcome(
        &self,
        index: usize,
        directive: &FileDirective,
        action: DirectiveAction,
        status: DirectiveStatus,
    ) -> DirectiveOutcome {
        let final_path = match directive {
            FileDirective::UpdateFile {
                move_to: Some(target),
                ..
            } if action == DirectiveAction::Move && status.is_applied() => self
                .root
                .resolve(target)
                .ok()
                .map(|path| self.root.relative(&path).to_path_buf()),
            _ => None,
        };
        match &status {
            DirectiveStatus::Failed { error } => tracing::warn!(
                index,
                path = directive.path(),
                %error,
                "patch directive failed"
            ),
            _ => tracing::debug!(index, path = directive.path(), "patch directive processed"),
        }
        DirectiveOutcome {
            index,
            action,
            path: directive.path().to_string(),
            final_path,
            status,
        }
    }
}

fn skip_applied(statuses: &mut [DirectiveStatus], reason: &str) {
    for status in statuses.iter_mut().filter(|status| status.is_applied()) {
        *status = DirectiveStatus::Skipped {
            reason: reason.to_string(),
        };
    }
}

fn stage_directive(
    stage: &mut Stage,
    index: usize,
    directive: &FileDirective,
    paths: &Resolved,
) -> Result<(), DirectiveError> {
    match directive {
        FileDirective::AddFile { path, lines } => {
            if stage.state(&paths.source)? != EntryState::Missing {
                return Err(DirectiveError::Conflict { path: path.clone() });
            }
            let content: String = lines.iter().map(|line| format!("{line}\n")).collect();
            stage.write(&paths.source, content, index);
        }
        FileDirective::DeleteFile { path } => {
            if stage.state(&paths.source)? != EntryState::File {
                return Err(DirectiveError::NotFound { path: path.clone() });
            }
            stage.remove(&paths.source, index);
        }
        FileDirective::UpdateFile {
            path,
            move_to,
            hunks,
        } => {
            if stage.state(&paths.source)? != EntryState::File {
                return Err(DirectiveError::NotFound { path: path.clone() });
            }
            let original = stage.read(&paths.source)?;
            let updated = apply_hunks_to_content(&original, hunks, path)?;

            match (&paths.target, move_to) {
                (Some(target_path), Some(target)) => {
                    if stage.state(target_path)? != EntryState::Missing {
                        return Err(DirectiveError::Conflict {
                            path: target.clone(),
                        });
                    }
                    stage.write(target_path, updated, index);
                    stage.remove(&paths.source, index);
                }
                _ => stage.write(&paths.source, updated, index),
            }
        }
    }
    Ok(())
}

/// Apply hunks in order against an in-memory copy. Each hunk is searched for
/// from the cursor left by the previous one; nothing before it is revisited.
pub(crate) fn apply_hunks_to_content(
    content: &str,
    hunks: &[Hunk],
    path: &str,
) -> Result<String, DirectiveError> {
    let line_ending = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines = split_content_lines(content);
    let had_trailing_newline = content.ends_with('\n');
    let mut search_from = 0usize;

    for (position, hunk) in hunks.iter().enumerate() {
        let (old_lines, new_lines) = hunk.old_new_lines();
        let found = if hunk.is_end_of_file() {
            find_tail(&lines, &old_lines, search_from)
        } else {
            find_subsequence(&lines, &old_lines, search_from)
        };
        let Some(start) = found else {
            return Err(DirectiveError::HunkMismatch {
                path: path.to_string(),
                hunk: position + 1,
                header: hunk.header.clone(),
            });
        };

        let end = start + old_lines.len();
        search_from = start + new_lines.len();
        lines.splice(start..end, new_lines);
    }

    let mut updated = lines.join(line_ending);
    if !lines.is_empty() && (had_trailing_newline || content.is_empty()) {
        updated.push_str(line_ending);
    }
    Ok(updated)
}

fn split_content_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut lines: Vec<String> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    if content.ends_with('\n') && lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::apply_hunks_to_content;
    use crate::DirectiveErrorKind;
    use crate::patch::types::{Hunk, HunkLine};

    fn hunk(lines: Vec<HunkLine>) -> Hunk {
        Hunk {
            header: String::new(),
            lines,
        }
    }

    fn context(value: &str) -> HunkLine {
        HunkLine::Context(value.to_string())
    }

    fn remove(value: &str) -> HunkLine {
        HunkLine::Remove(value.to_string())
    }

    fn add(value: &str) -> HunkLine {
        HunkLine::Add(value.to_string())
    }

    #[test]
    fn apply_hunks_to_content_exact_match_updates_content() {
        let hunks = vec![hunk(vec![remove("line2"), add("line-two")])];
        let updated =
            apply_hunks_to_content("line1\nline2\n", &hunks, "f.txt").expect("should apply");
        assert_eq!(updated, "line1\nline-two\n");
    }

    #[test]
    fn apply_hunks_to_content_replaces_between_context() {
        let hunks = vec![hunk(vec![context("foo"), remove("bar"), add("baz")])];
        let updated =
            apply_hunks_to_content("foo\nbar\nqux\n", &hunks, "a.txt").expect("should apply");
        assert_eq!(updated, "foo\nbaz\nqux\n");
    }

    #[test]
    fn apply_hunks_to_content_never_searches_behind_cursor() {
        let hunks = vec![
            hunk(vec![remove("b"), add("B")]),
            hunk(vec![remove("a"), add("A")]),
        ];
        let err = apply_hunks_to_content("a\nb\n", &hunks, "f.txt")
            .expect_err("second hunk lies before the cursor");
        assert_eq!(err.kind(), DirectiveErrorKind::HunkMismatch);
        assert!(err.to_string().contains("hunk 2"));
    }

    #[test]
    fn apply_hunks_to_content_applies_repeated_blocks_in_order() {
        let hunks = vec![
            hunk(vec![remove("x"), add("first")]),
            hunk(vec![remove("x"), add("second")]),
        ];
        let updated =
            apply_hunks_to_content("x\nmid\nx\n", &hunks, "f.txt").expect("should apply");
        assert_eq!(updated, "first\nmid\nsecond\n");
    }

    #[test]
    fn apply_hunks_to_content_anchors_end_of_file_hunks() {
        let hunks = vec![hunk(vec![context("}"), add("// tail"), HunkLine::EndOfFile])];
        let updated = apply_hunks_to_content("fn a() {\n}\nfn b() {\n}\n", &hunks, "f.rs")
            .expect("should apply");
        assert_eq!(updated, "fn a() {\n}\nfn b() {\n}\n// tail\n");
    }

    #[test]
    fn apply_hunks_to_content_pure_addition_inserts_at_cursor() {
        let hunks = vec![
            hunk(vec![context("one"), add("one-and-a-half")]),
            hunk(vec![add("inserted")]),
        ];
        let updated =
            apply_hunks_to_content("one\ntwo\n", &hunks, "f.txt").expect("should apply");
        assert_eq!(updated, "one\none-and-a-half\ninserted\ntwo\n");
    }

    #[test]
    fn apply_hunks_to_content_preserves_missing_trailing_newline_and_crlf() {
        let hunks = vec![hunk(vec![remove("b"), add("c")])];
        assert_eq!(
            apply_hunks_to_content("a\nb", &hunks, "f.txt").expect("should apply"),
            "a\nc"
        );
        assert_eq!(
            apply_hunks_to_content("a\r\nb\r\n", &hunks, "f.txt").expect("should apply"),
            "a\r\nc\r\n"
        );
    }

    #[test]
    fn apply_hunks_to_content_fills_empty_file() {
        let hunks = vec![hunk(vec![add("first line")])];
        let updated = apply_hunks_to_content("", &hunks, "f.txt").expect("should apply");
        assert_eq!(updated, "first line\n");
    }
}
