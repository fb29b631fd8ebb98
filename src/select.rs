//! Choosing which PDF files to watermark
//!
//! Either the explicit list given on the command line, or every `*.pdf` file
//! in a directory, minus the excluded file names.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use glob::{MatchOptions, Pattern};
use tracing::debug;
use crate::error::{Error, Result};

/// Ordered, deduplicated list of files to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet(Vec<PathBuf>);

impl FileSet {
    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for FileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Resolve the files to process
///
/// With a non-empty `input_files`, exactly those paths are used in the given
/// order (relative ones resolved against `cwd`, duplicates dropped). With an
/// empty list, every regular file in `cwd` ending in `.pdf` (any case) is
/// used, sorted by path. Either way, candidates whose file name is in
/// `exclude` are removed before anything is opened.
///
/// Returns [`Error::EmptySelection`] if nothing is left.
pub fn select(input_files: &[PathBuf], exclude: &[String], cwd: &Path) -> Result<FileSet> {
    let candidates = if input_files.is_empty() {
        discover_pdfs(cwd)?
    } else {
        explicit_files(input_files, cwd)
    };

    let excluded: HashSet<&OsStr> = exclude.iter().map(OsStr::new).collect();
    let selected: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| match path.file_name() {
            Some(name) if excluded.contains(name) => {
                debug!(path = %path.display(), "excluded");
                false
            }
            _ => true,
        })
        .collect();

    if selected.is_empty() {
        return Err(Error::EmptySelection);
    }

    Ok(FileSet(selected))
}

/// Explicit paths in the order given, first occurrence wins
fn explicit_files(input_files: &[PathBuf], cwd: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    input_files
        .iter()
        .map(|path| cwd.join(path))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Every `*.pdf` regular file directly inside `dir`
///
/// Only file names are matched, case-insensitively. The directory itself is
/// listed as-is so glob metacharacters or case differences in its own name
/// cannot pull in files from elsewhere.
fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new("*.pdf").map_err(|e| Error::InvalidGlob(e.to_string()))?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| pattern.matches_with(name, options));
        if matches && path.is_file() {
            paths.push(path);
        }
    }

    // Sort paths for consistent ordering
    paths.sort();
    debug!(dir = %dir.display(), found = paths.len(), "discovered PDF files");

    Ok(paths)
}
