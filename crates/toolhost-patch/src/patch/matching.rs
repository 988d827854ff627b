/// First index at or after `from` where `pattern` occurs contiguously.
pub(crate) fn find_subsequence(lines: &[String], pattern: &[String], from: usize) -> Option<usize> {
    if pattern.is_empty() {
        return Some(from.min(lines.len()));
    }
    if pattern.len() > lines.len() {
        return None;
    }
    (from..=lines.len() - pattern.len())
        .find(|&start| lines[start..start + pattern.len()] == *pattern)
}

/// Index where `pattern` matches the tail of `lines`, if that index is not
/// before `from`.
pub(crate) fn find_tail(lines: &[String], pattern: &[String], from: usize) -> Option<usize> {
    let start = lines.len().checked_sub(pattern.len())?;
    if start < from {
        return None;
    }
    (lines[start..] == *pattern).then_some(start)
}
