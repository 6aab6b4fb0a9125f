use super::types::{ChangedFile, FileStatus};
use super::GitHubError;

/// Split a unified diff (GitHub's `application/vnd.github.diff` output)
/// into one ChangedFile per `diff --git` section.
///
/// Each section's text is kept verbatim, headers included, so joining the
/// sections reproduces the input. Additions and deletions are counted from
/// hunk bodies only.
///
/// New files have `--- /dev/null` (or `new file mode`), deleted files have
/// `+++ /dev/null` (or `deleted file mode`). Binary files carry no hunks and
/// are flagged from their `Binary files ... differ` or `GIT binary patch` line.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<ChangedFile>, GitHubError> {
    if raw_diff.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut current: Option<ChangedFile> = None;
    let mut in_hunk = false;

    for raw_line in raw_diff.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);

        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            in_hunk = false;
            current = Some(ChangedFile {
                path: parse_header_path(rest)?,
                status: FileStatus::Modified,
                additions: 0,
                deletions: 0,
                diff: String::new(),
                binary: false,
                contents: None,
            });
        }

        let Some(file) = current.as_mut() else {
            // Preamble before the first file header carries nothing we need.
            continue;
        };
        file.diff.push_str(raw_line);

        if line.starts_with("diff --git ") {
            continue;
        }

        if line.starts_with("@@") {
            parse_hunk_header(line)?;
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            if line.starts_with("new file mode") || line == "--- /dev/null" {
                file.status = FileStatus::Added;
            } else if line.starts_with("deleted file mode") || line == "+++ /dev/null" {
                file.status = FileStatus::Removed;
            } else if line.starts_with("Binary files ") || line == "GIT binary patch" {
                file.binary = true;
            }
            continue;
        }

        if line.starts_with('+') {
            file.additions += 1;
        } else if line.starts_with('-') {
            file.deletions += 1;
        }
    }

    if let Some(file) = current.take() {
        files.push(file);
    }
    Ok(files)
}

/// Extract the head-side path from `a/{old} b/{new}`. Splitting on the last
/// ` b/` keeps paths containing spaces intact. Git quotes both paths when
/// they contain special characters: `"a/f\303\251.rs" "b/f\303\251.rs"`.
fn parse_header_path(rest: &str) -> Result<String, GitHubError> {
    if rest.ends_with('"') {
        if let Some(index) = rest.rfind(" \"b/") {
            let path = unquote_path(&rest[index + 1..])?;
            return Ok(path.strip_prefix("b/").unwrap_or(&path).to_string());
        }
    }
    if let Some((_, b_path)) = rest.rsplit_once(" b/") {
        return Ok(b_path.to_string());
    }
    let mut parts = rest.split_whitespace();
    let a_path = parts
        .next()
        .ok_or_else(|| GitHubError::DiffParse("Missing a/ path in diff header".to_string()))?;
    Ok(a_path.strip_prefix("a/").unwrap_or(a_path).to_string())
}

/// Undo git's C-style path quoting. Octal escapes are raw bytes of the
/// UTF-8 encoded name.
fn unquote_path(quoted: &str) -> Result<String, GitHubError> {
    let malformed = || GitHubError::DiffParse(format!("Malformed quoted path: {}", quoted));
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(malformed)?;

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes();
    while let Some(byte) = iter.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let escaped = iter.next().ok_or_else(malformed)?;
        let value = match escaped {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'"' | b'\\' => escaped,
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                for _ in 0..2 {
                    let digit = iter
                        .next()
                        .filter(|d| (b'0'..=b'7').contains(d))
                        .ok_or_else(malformed)?;
                    value = value * 8 + u32::from(digit - b'0');
                }
                u8::try_from(value).map_err(|_| malformed())?
            }
            _ => return Err(malformed()),
        };
        bytes.push(value);
    }
    String::from_utf8(bytes).map_err(|_| malformed())
}

/// Check that a hunk header has well-formed `-old +new` ranges.
fn parse_hunk_header(line: &str) -> Result<(), GitHubError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| GitHubError::DiffParse("Invalid hunk header".to_string()))?;
    let (ranges, _) = header
        .split_once("@@")
        .ok_or_else(|| GitHubError::DiffParse(format!("Unterminated hunk header: {}", line)))?;
    let mut parts = ranges.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| GitHubError::DiffParse("Missing old range".to_string()))?;
    let new_part = parts
        .next()
        .ok_or_else(|| GitHubError::DiffParse("Missing new range".to_string()))?;

    parse_range(old_part, '-')?;
    parse_range(new_part, '+')
}

fn parse_range(part: &str, prefix: char) -> Result<(), GitHubError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| GitHubError::DiffParse("Invalid range prefix".to_string()))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    start_str
        .parse::<usize>()
        .map_err(|_| GitHubError::DiffParse(format!("Invalid range start in {}", part)))?;
    count_str
        .parse::<usize>()
        .map_err(|_| GitHubError::DiffParse(format!("Invalid range count in {}", part)))?;
    Ok(())
}
