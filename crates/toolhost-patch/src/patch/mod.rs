mod apply;
mod matching;
mod parser;
mod path;
mod report;
mod stage;
mod types;

pub use apply::{ApplyMode, PatchApplier};
pub use parser::{BEGIN_MARKER, END_MARKER, parse_patch};
pub use path::PatchRoot;
pub use report::{ApplyReport, DirectiveOutcome, DirectiveStatus};
pub use types::{DirectiveAction, FileDirective, Hunk, HunkLine, PatchEnvelope};
