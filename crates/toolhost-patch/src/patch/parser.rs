use crate::ParseError;

use super::types::{FileDirective, Hunk, HunkLine, PatchEnvelope};

pub const BEGIN_MARKER: &str = "*** Begin Patch";
pub const END_MARKER: &str = "*** End Patch";
const ADD_FILE: &str = "*** Add File:";
const DELETE_FILE: &str = "*** Delete File:";
const UPDATE_FILE: &str = "*** Update File:";
const MOVE_TO: &str = "*** Move to:";
const END_OF_FILE: &str = "*** End of File";

/// Parse a full envelope. Nothing is touched on disk; a malformed envelope is
/// rejected as a whole.
pub fn parse_patch(text: &str) -> Result<PatchEnvelope, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(start) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return Err(ParseError::new(
            1,
            format!("patch is empty; expected '{BEGIN_MARKER}'"),
        ));
    };
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(start);

    if lines[start].trim() != BEGIN_MARKER {
        return Err(ParseError::new(
            start + 1,
            format!("patch must start with '{BEGIN_MARKER}'"),
        ));
    }
    if end == start || lines[end].trim() != END_MARKER {
        return Err(ParseError::new(
            end + 1,
            format!("patch must end with '{END_MARKER}'"),
        ));
    }

    let mut cursor = Cursor {
        lines: &lines,
        idx: start + 1,
        end,
    };
    let mut directives = Vec::new();
    while cursor.idx < cursor.end {
        let line = cursor.current();
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            cursor.idx += 1;
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(ADD_FILE) {
            let path = cursor.path_argument(rest, "Add File")?;
            cursor.idx += 1;
            directives.push(parse_add_file(&mut cursor, path)?);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(DELETE_FILE) {
            let path = cursor.path_argument(rest, "Delete File")?;
            cursor.idx += 1;
            directives.push(FileDirective::DeleteFile { path });
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(UPDATE_FILE) {
            let path = cursor.path_argument(rest, "Update File")?;
            cursor.idx += 1;
            directives.push(parse_update_file(&mut cursor, path)?);
            continue;
        }

        let message = if trimmed == BEGIN_MARKER {
            format!("nested '{BEGIN_MARKER}'")
        } else if trimmed == END_MARKER {
            format!("'{END_MARKER}' appears before the end of the patch")
        } else if trimmed.starts_with("***") {
            format!("unrecognized patch action: '{trimmed}'")
        } else {
            format!("expected a file directive, found '{line}'")
        };
        return Err(cursor.error(message));
    }

    if directives.is_empty() {
        return Err(ParseError::new(
            end + 1,
            "patch must contain at least one file directive",
        ));
    }

    Ok(PatchEnvelope { directives })
}

struct Cursor<'a> {
    lines: &'a [&'a str],
    idx: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    fn current(&self) -> &'a str {
        self.lines[self.idx]
    }

    fn at_boundary(&self) -> bool {
        self.idx >= self.end || is_directive_boundary(self.current())
    }

    /// True when only blank lines remain before the next directive.
    fn only_blank_until_boundary(&self) -> bool {
        self.lines[self.idx..self.end]
            .iter()
            .take_while(|line| !is_directive_boundary(line))
            .all(|line| line.trim().is_empty())
    }

    fn skip_to_boundary(&mut self) {
        while !self.at_boundary() {
            self.idx += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.idx + 1, message)
    }

    fn path_argument(&self, rest: &str, action: &str) -> Result<String, ParseError> {
        let path = rest.trim();
        if path.is_empty() {
            return Err(self.error(format!("'{action}' requires a path")));
        }
        Ok(path.to_string())
    }
}

fn parse_add_file(cursor: &mut Cursor<'_>, path: String) -> Result<FileDirective, ParseError> {
    let mut lines = Vec::new();
    while !cursor.at_boundary() {
        let line = cursor.current();
        if line.trim().is_empty() && cursor.only_blank_until_boundary() {
            cursor.skip_to_boundary();
            break;
        }
        let Some(payload) = line.strip_prefix('+') else {
            return Err(cursor.error(format!(
                "add-file line for '{path}' must start with '+': '{line}'"
            )));
        };
        lines.push(payload.to_string());
        cursor.idx += 1;
    }
    Ok(FileDirective::AddFile { path, lines })
}

fn parse_update_file(cursor: &mut Cursor<'_>, path: String) -> Result<FileDirective, ParseError> {
    let mut move_to = None;
    if cursor.idx < cursor.end {
        if let Some(rest) = cursor.current().trim_end().strip_prefix(MOVE_TO) {
            move_to = Some(cursor.path_argument(rest, "Move to")?);
            cursor.idx += 1;
        }
    }

    let mut hunks = Vec::new();
    while !cursor.at_boundary() {
        let header_line = cursor.current();
        if header_line.trim().is_empty() && cursor.only_blank_until_boundary() {
            cursor.skip_to_boundary();
            break;
        }
        let Some(header) = header_line.trim_end().strip_prefix("@@") else {
            return Err(cursor.error(format!(
                "invalid hunk header in update '{path}': '{header_line}'"
            )));
        };
        let header_line_no = cursor.idx + 1;
        cursor.idx += 1;

        let lines = parse_hunk_lines(cursor, &path)?;
        if !lines.iter().any(|line| !matches!(line, HunkLine::EndOfFile)) {
            return Err(ParseError::new(
                header_line_no,
                format!("empty hunk in update '{path}'"),
            ));
        }
        hunks.push(Hunk {
            header: header.trim().to_string(),
            lines,
        });
    }

    if hunks.is_empty() && move_to.is_none() {
        return Err(cursor.error(format!(
            "update of '{path}' must include at least one hunk"
        )));
    }

    Ok(FileDirective::UpdateFile {
        path,
        move_to,
        hunks,
    })
}

fn parse_hunk_lines(cursor: &mut Cursor<'_>, path: &str) -> Result<Vec<HunkLine>, ParseError> {
    let mut lines = Vec::new();
    while !cursor.at_boundary() && !cursor.current().starts_with("@@") {
        let line = cursor.current();
        if lines.last() == Some(&HunkLine::EndOfFile) {
            if line.trim().is_empty() && cursor.only_blank_until_boundary() {
                cursor.skip_to_boundary();
                break;
            }
            return Err(cursor.error(format!(
                "unexpected content after '{END_OF_FILE}' in update '{path}'"
            )));
        }
        if line.trim_end() == END_OF_FILE {
            lines.push(HunkLine::EndOfFile);
            cursor.idx += 1;
            continue;
        }
        if line.is_empty() {
            if cursor.only_blank_until_boundary() {
                cursor.skip_to_boundary();
                break;
            }
            lines.push(HunkLine::Context(String::new()));
            cursor.idx += 1;
            continue;
        }

        let parsed = if let Some(value) = line.strip_prefix(' ') {
            HunkLine::Context(value.to_string())
        } else if let Some(value) = line.strip_prefix('-') {
            HunkLine::Remove(value.to_string())
        } else if let Some(value) = line.strip_prefix('+') {
            HunkLine::Add(value.to_string())
        } else {
            return Err(cursor.error(format!(
                "invalid hunk line prefix in update '{path}': '{line}'"
            )));
        };
        lines.push(parsed);
        cursor.idx += 1;
    }
    Ok(lines)
}

fn is_directive_boundary(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.starts_with("***") && trimmed != END_OF_FILE && !trimmed.starts_with(MOVE_TO)
}
