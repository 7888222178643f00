//! File listing helpers.

use std::fs;
use std::io;
use std::path::Path;

use glob::{MatchOptions, Pattern};

/// Names of the regular files directly inside `dir` whose file name matches
/// the shell-style `pattern`, sorted ascending.
///
/// Matching is case-sensitive and `*` does not cross path separators.
pub fn sorted_matching_files(dir: &Path, pattern: &str) -> io::Result<Vec<String>> {
    let pattern =
        Pattern::new(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if matches(&pattern, &name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn matches(pattern: &Pattern, name: &str) -> bool {
    pattern.matches_with(
        name,
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        },
    )
}
