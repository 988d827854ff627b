use std::path::PathBuf;

use serde_json::{Value, json};

use crate::DirectiveError;

use super::apply::ApplyMode;
use super::types::DirectiveAction;

#[derive(Debug)]
pub enum DirectiveStatus {
    Applied,
    Failed { error: DirectiveError },
    /// Validated but not written (transactional mode only).
    Skipped { reason: String },
}

impl DirectiveStatus {
    pub(crate) fn failed(error: DirectiveError) -> Self {
        Self::Failed { error }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&DirectiveError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug)]
pub struct DirectiveOutcome {
    pub index: usize,
    pub action: DirectiveAction,
    pub path: String,
    /// Location after a rename, relative to the patch root.
    pub final_path: Option<PathBuf>,
    pub status: DirectiveStatus,
}

impl DirectiveOutcome {
    fn summary_line(&self) -> String {
        match &self.status {
            DirectiveStatus::Applied => match (self.action, &self.final_path) {
                (DirectiveAction::Move, Some(target)) => {
                    format!("R {} -> {}", self.path, target.display())
                }
                (DirectiveAction::Add, _) => format!("A {}", self.path),
                (DirectiveAction::Delete, _) => format!("D {}", self.path),
                _ => format!("M {}", self.path),
            },
            DirectiveStatus::Failed { error } => {
                format!("! {} {}: {error}", self.action.label(), self.path)
            }
            DirectiveStatus::Skipped { reason } => {
                format!("- {} {}: {reason}", self.action.label(), self.path)
            }
        }
    }
}

/// Per-directive result of one `apply`.
#[derive(Debug)]
pub struct ApplyReport {
    pub mode: ApplyMode,
    pub outcomes: Vec<DirectiveOutcome>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.status.is_applied())
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status.is_applied())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status.is_failed())
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&DirectiveOutcome, &DirectiveError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.status.error().map(|error| (outcome, error)))
    }

    /// Human-readable summary, one line per directive.
    pub fn summary(&self) -> String {
        let header = if self.is_success() {
            "Applied patch:".to_string()
        } else {
            format!(
                "Patch applied with errors ({} of {} directives failed):",
                self.failed_count(),
                self.outcomes.len()
            )
        };
        std::iter::once(header)
            .chain(self.outcomes.iter().map(DirectiveOutcome::summary_line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> Value {
        let outcomes: Vec<Value> = self
            .outcomes
            .iter()
            .map(|outcome| {
                let mut entry = json!({
                    "index": outcome.index,
                    "action": outcome.action,
                    "path": outcome.path,
                    "status": outcome.status.label(),
                });
                if let Some(final_path) = &outcome.final_path {
                    entry["final_path"] = json!(final_path.display().to_string());
                }
                match &outcome.status {
                    DirectiveStatus::Failed { error } => {
                        entry["error"] = json!({
                            "kind": error.kind(),
                            "message": error.to_string(),
                        });
                    }
                    DirectiveStatus::Skipped { reason } => entry["reason"] = json!(reason),
                    DirectiveStatus::Applied => {}
                }
                entry
            })
            .collect();

        json!({
            "mode": self.mode,
            "success": self.is_success(),
            "outcomes": outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, action: DirectiveAction, status: DirectiveStatus) -> DirectiveOutcome {
        DirectiveOutcome {
            index,
            action,
            path: format!("file{index}.txt"),
            final_path: (action == DirectiveAction::Move).then(|| PathBuf::from("moved.txt")),
            status,
        }
    }

    #[test]
    fn summary_lists_applied_directives_with_status_letters() {
        let report = ApplyReport {
            mode: ApplyMode::PerDirective,
            outcomes: vec![
                outcome(0, DirectiveAction::Add, DirectiveStatus::Applied),
                outcome(1, DirectiveAction::Update, DirectiveStatus::Applied),
                outcome(2, DirectiveAction::Move, DirectiveStatus::Applied),
                outcome(3, DirectiveAction::Delete, DirectiveStatus::Applied),
            ],
        };
        assert!(report.is_success());
        assert_eq!(
            report.summary(),
            "Applied patch:\nA file0.txt\nM file1.txt\nR file2.txt -> moved.txt\nD file3.txt"
        );
    }

    #[test]
    fn to_json_reports_error_kind_and_skip_reason() {
        let report = ApplyReport {
            mode: ApplyMode::Transactional,
            outcomes: vec![
                outcome(
                    0,
                    DirectiveAction::Add,
                    DirectiveStatus::Skipped {
                        reason: "not committed".to_string(),
                    },
                ),
                outcome(
                    1,
                    DirectiveAction::Delete,
                    DirectiveStatus::failed(DirectiveError::NotFound {
                        path: "file1.txt".to_string(),
                    }),
                ),
            ],
        };

        let value = report.to_json();
        assert_eq!(value["mode"], "transactional");
        assert_eq!(value["success"], false);
        assert_eq!(value["outcomes"][0]["status"], "skipped");
        assert_eq!(value["outcomes"][0]["reason"], "not committed");
        assert_eq!(value["outcomes"][1]["error"]["kind"], "not_found");
        assert_eq!(report.failed_count(), 1);
        assert!(report.summary().starts_with("Patch applied with errors (1 of 2"));
    }
}
