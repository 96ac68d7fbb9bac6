//! The rolling file writer

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, error, info};

use crate::archive::ArchiveNaming;
use crate::error::RollError;

/// Rotation and retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollPolicy {
    /// Rotate once this many bytes were written to the active file (0 = never)
    pub max_size_bytes: u64,
    /// Keep at most this many archive generations (0 = keep all)
    pub max_archives: u32,
    /// Gzip archived generations
    pub compress: bool,
}

impl RollPolicy {
    /// Create an uncompressed policy
    pub fn new(max_size_bytes: u64, max_archives: u32) -> Self {
        Self {
            max_size_bytes,
            max_archives,
            compress: false,
        }
    }

    /// A policy that never rotates
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set whether archives are gzipped
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

struct RollState {
    file: Option<File>,
    written: u64,
    closed: bool,
    poisoned: bool,
}

/// An append-only file that rotates into numbered archives once it grows too large
///
/// The size check runs after each write, so the active file can exceed
/// `max_size_bytes` by at most the length of the write that crossed it.
pub struct RollingFile {
    path: PathBuf,
    policy: RollPolicy,
    naming: ArchiveNaming,
    state: Mutex<RollState>,
}

impl RollingFile {
    /// Open (or create) the active file at `path`
    ///
    /// Appends to an existing file; its current length counts toward the next rotation.
    pub fn open(path: impl AsRef<Path>, policy: RollPolicy) -> Result<Self, RollError> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, ?policy, "RollingFile::open: called");

        let naming = ArchiveNaming::new(&path, policy.compress)?;
        let file = open_append(&path)?;
        let written = file.metadata().map_err(RollError::io(&path))?.len();

        Ok(Self {
            path,
            policy,
            naming,
            state: Mutex::new(RollState {
                file: Some(file),
                written,
                closed: false,
                poisoned: false,
            }),
        })
    }

    /// Path of the active file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> RollPolicy {
        self.policy
    }

    /// Archive naming scheme for this file
    pub fn naming(&self) -> &ArchiveNaming {
        &self.naming
    }

    /// Bytes written to the active file since it was opened or last rotated
    pub fn bytes_written(&self) -> u64 {
        self.lock().written
    }

    /// Whether a rotation failed part way and the file stopped accepting writes
    pub fn is_poisoned(&self) -> bool {
        self.lock().poisoned
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append `bytes` to the active file, rotating afterwards if the ceiling was reached
    pub fn write(&self, bytes: &[u8]) -> Result<usize, RollError> {
        self.append(bytes)
    }

    /// Flush and release the active file. Later writes fail with [`RollError::Closed`].
    pub fn close(&self) -> Result<(), RollError> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        debug!(path = ?self.path, "RollingFile::close: called");
        state.closed = true;
        if let Some(mut file) = state.file.take() {
            file.flush().map_err(RollError::io(&self.path))?;
            file.sync_all().map_err(RollError::io(&self.path))?;
        }
        Ok(())
    }

    /// Existing archive paths, newest generation first
    pub fn archived_paths(&self) -> Result<Vec<PathBuf>, RollError> {
        Ok(self.naming.discover()?.into_iter().map(|(_, path)| path).collect())
    }

    /// Move the given archives up one generation, honoring the retention ceiling
    pub fn shift_archived_files(&self, paths: &[PathBuf]) -> Result<(), RollError> {
        self.naming.shift(paths, self.policy.max_archives)
    }

    /// Parse the generation index from an archive file name
    pub fn extract_archived_file_index(&self, name: &str) -> Result<u32, RollError> {
        self.naming.extract_index(name)
    }

    /// Rotate now, regardless of the size ceiling
    pub fn rotate(&self) -> Result<(), RollError> {
        let mut state = self.lock();
        self.check_writable(&state)?;
        self.rotate_locked(&mut state)
    }

    fn lock(&self) -> MutexGuard<'_, RollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, state: &RollState) -> Result<(), RollError> {
        if state.closed {
            return Err(RollError::Closed {
                path: self.path.clone(),
            });
        }
        if state.poisoned {
            return Err(RollError::Poisoned {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    fn append(&self, bytes: &[u8]) -> Result<usize, RollError> {
        let mut state = self.lock();
        self.check_writable(&state)?;

        let file = state.file.as_mut().ok_or_else(|| RollError::Closed {
            path: self.path.clone(),
        })?;
        file.write_all(bytes).map_err(RollError::io(&self.path))?;
        state.written += bytes.len() as u64;

        if self.policy.max_size_bytes > 0 && state.written >= self.policy.max_size_bytes {
            debug!(written = state.written, max = self.policy.max_size_bytes, "RollingFile::append: ceiling reached");
            self.rotate_locked(&mut state)?;
        }
        Ok(bytes.len())
    }

    fn rotate_locked(&self, state: &mut RollState) -> Result<(), RollError> {
        let result = self.run_rotation(state);
        if let Err(e) = &result {
            error!(path = ?self.path, error = %e, "RollingFile: rotation failed, file is now unusable");
            state.poisoned = true;
        }
        result
    }

    fn run_rotation(&self, state: &mut RollState) -> Result<(), RollError> {
        if let Some(mut file) = state.file.take() {
            file.flush().map_err(RollError::io(&self.path))?;
        }

        let archives = self.archived_paths()?;
        self.shift_archived_files(&archives)?;

        let newest = self.naming.archive_path(1);
        if self.policy.compress {
            compress_file(&self.path, &newest)?;
            fs::remove_file(&self.path).map_err(|source| RollError::Remove {
                path: self.path.clone(),
                source,
            })?;
        } else {
            fs::rename(&self.path, &newest).map_err(|source| RollError::Rename {
                from: self.path.clone(),
                to: newest.clone(),
                source,
            })?;
        }

        self.naming.enforce_retention(self.policy.max_archives)?;

        state.file = Some(open_append(&self.path)?);
        info!(path = ?self.path, archived = ?newest, bytes = state.written, "Rotated log file");
        state.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for RollingFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(path = ?self.path, error = %e, "RollingFile: close on drop failed");
        }
    }
}

fn open_append(path: &Path) -> Result<File, RollError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(RollError::io(path))
}

fn compress_file(source: &Path, target: &Path) -> Result<(), RollError> {
    debug!(?source, ?target, "compress_file: called");
    let compress_err = |source_err| RollError::Compress {
        path: source.to_path_buf(),
        source: source_err,
    };

    let input = File::open(source).map_err(compress_err)?;
    let output = File::create(target).map_err(compress_err)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder).map_err(compress_err)?;
    encoder.finish().map_err(compress_err)?;
    Ok(())
}
