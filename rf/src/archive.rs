//! Archive generation naming, discovery and renumbering
//!
//! Generation `N` of `app.log` lives at `app.log.N` (or `app.log.N.gz`). `N = 1`
//! is the most recently rotated file and larger indices are older.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::RollError;

/// Naming scheme for the archives of one base path
#[derive(Debug, Clone)]
pub struct ArchiveNaming {
    base: PathBuf,
    compressed: bool,
    pattern: Regex,
}

impl ArchiveNaming {
    /// Build the naming scheme for `base`, matching `.gz` archives when `compressed`
    pub fn new(base: impl AsRef<Path>, compressed: bool) -> Result<Self, RollError> {
        let base = base.as_ref().to_path_buf();
        let file_name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = if compressed { r"\.gz" } else { "" };
        let pattern = Regex::new(&format!(r"^{}\.([1-9][0-9]*){}$", regex::escape(&file_name), suffix))?;
        debug!(?base, compressed, pattern = %pattern, "ArchiveNaming::new: called");
        Ok(Self {
            base,
            compressed,
            pattern,
        })
    }

    /// The active file path archives are derived from
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether archives carry the `.gz` suffix
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The file-name pattern archives must match
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Path of generation `index`
    pub fn archive_path(&self, index: u32) -> PathBuf {
        let mut name = OsString::from(self.base.as_os_str());
        name.push(format!(".{}", index));
        if self.compressed {
            name.push(".gz");
        }
        PathBuf::from(name)
    }

    /// Check whether a file name (or path) names one of our archives
    pub fn is_archive(&self, name: &str) -> bool {
        self.extract_index(name).is_ok()
    }

    /// Parse the generation index out of an archive file name (or path)
    pub fn extract_index(&self, name: &str) -> Result<u32, RollError> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let captures = self.pattern.captures(&file_name).ok_or_else(|| RollError::NotArchive {
            name: name.to_string(),
        })?;
        let digits = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        digits.parse::<u32>().map_err(|source| RollError::InvalidIndex {
            name: name.to_string(),
            source,
        })
    }

    fn directory(&self) -> PathBuf {
        match self.base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Find every existing archive file, ordered newest (index 1) to oldest
    pub fn discover(&self) -> Result<Vec<(u32, PathBuf)>, RollError> {
        let dir = self.directory();
        let mut found = Vec::new();

        for entry in fs::read_dir(&dir).map_err(RollError::io(&dir))? {
            let entry = entry.map_err(RollError::io(&dir))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Ok(index) = self.extract_index(name) {
                found.push((index, self.archive_path(index)));
            }
        }

        found.sort_by_key(|(index, _)| *index);
        debug!(dir = ?dir, count = found.len(), "ArchiveNaming::discover: found archives");
        Ok(found)
    }

    /// Move every archive in `paths` up one generation
    ///
    /// Archives are processed from the highest index down so a rename never lands
    /// on a generation that has not been moved yet. When `max_archives` is set, an
    /// archive whose new index would exceed it is deleted instead of renamed.
    pub fn shift(&self, paths: &[PathBuf], max_archives: u32) -> Result<(), RollError> {
        debug!(count = paths.len(), max_archives, "ArchiveNaming::shift: called");
        let mut indexed = paths
            .iter()
            .map(|path| Ok((self.extract_index(&path.to_string_lossy())?, path)))
            .collect::<Result<Vec<_>, RollError>>()?;
        indexed.sort_by(|a, b| b.0.cmp(&a.0));

        for (index, path) in indexed {
            let next = index.saturating_add(1);
            if max_archives > 0 && next > max_archives {
                debug!(?path, index, "ArchiveNaming::shift: past retention ceiling, removing");
                fs::remove_file(path).map_err(|source| RollError::Remove {
                    path: path.clone(),
                    source,
                })?;
                continue;
            }

            let target = self.archive_path(next);
            debug!(from = ?path, to = ?target, "ArchiveNaming::shift: renaming");
            fs::rename(path, &target).map_err(|source| RollError::Rename {
                from: path.clone(),
                to: target.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Delete the oldest generations until at most `max_archives` remain
    pub fn enforce_retention(&self, max_archives: u32) -> Result<Vec<PathBuf>, RollError> {
        if max_archives == 0 {
            return Ok(Vec::new());
        }

        let archives = self.discover()?;
        let excess = archives.len().saturating_sub(max_archives as usize);
        let mut removed = Vec::with_capacity(excess);

        for (index, path) in archives.into_iter().rev().take(excess) {
            debug!(?path, index, "ArchiveNaming::enforce_retention: removing");
            fs::remove_file(&path).map_err(|source| RollError::Remove {
                path: path.clone(),
                source,
            })?;
            removed.push(path);
        }
        Ok(removed)
    }
}
