//! RollFile - size-bounded rolling log files
//!
//! A [`RollingFile`] appends to a single active file and, once the bytes written
//! since it was opened reach the configured ceiling, rotates it out into a
//! numbered archive generation. Older generations are renumbered, optionally
//! gzipped, and trimmed to a retention ceiling.
//!
//! # On-disk layout
//!
//! ```text
//! logs/
//! ├── app.log        # active file
//! ├── app.log.1      # newest archive (app.log.1.gz when compressing)
//! ├── app.log.2
//! └── app.log.3      # oldest archive kept
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rollfile::{RollPolicy, RollingFile, MEGABYTE};
//!
//! let policy = RollPolicy::new(10 * MEGABYTE, 5).compressed(true);
//! let file = RollingFile::open("logs/app.log", policy)?;
//! file.write(b"hello\n")?;
//! file.close()?;
//! ```

mod archive;
pub mod cli;
mod error;
mod rolling;
mod size;

pub use archive::ArchiveNaming;
pub use error::{ParseSizeError, RollError};
pub use rolling::{RollPolicy, RollingFile};
pub use size::{GIGABYTE, KILOBYTE, MEGABYTE, format_file_size, parse_size};

/// Maximum size value meaning "never rotate"
pub const UNLIMITED_SIZE: u64 = 0;

/// Maximum archive count meaning "keep every generation"
pub const UNLIMITED_ARCHIVES: u32 = 0;
