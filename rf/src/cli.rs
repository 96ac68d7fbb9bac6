//! CLI argument parsing for rollfile

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rf")]
#[command(author, version, about = "Size-bounded rolling log files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Append stdin to a rolling file, rotating as it grows
    Write {
        /// Active file path
        #[arg(required = true)]
        path: PathBuf,

        /// Rotate once the active file reaches this size (e.g. 512kb, 10mb; 0 = never)
        #[arg(short = 's', long, default_value = "10mb")]
        max_size: String,

        /// Number of archive generations to keep (0 = keep all)
        #[arg(short = 'n', long, default_value = "0")]
        max_archives: u32,

        /// Gzip archived generations
        #[arg(short, long)]
        compress: bool,
    },

    /// Rotate the active file immediately
    Rotate {
        /// Active file path
        #[arg(required = true)]
        path: PathBuf,

        /// Number of archive generations to keep (0 = keep all)
        #[arg(short = 'n', long, default_value = "0")]
        max_archives: u32,

        /// Gzip archived generations
        #[arg(short, long)]
        compress: bool,
    },

    /// List archive generations of a rolling file
    List {
        /// Active file path
        #[arg(required = true)]
        path: PathBuf,

        /// List gzipped archives instead of plain ones
        #[arg(short, long)]
        compressed: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_defaults() {
        let cli = Cli::try_parse_from(["rf", "write", "app.log"]).unwrap();
        match cli.command {
            Command::Write {
                path,
                max_size,
                max_archives,
                compress,
            } => {
                assert_eq!(path, PathBuf::from("app.log"));
                assert_eq!(max_size, "10mb");
                assert_eq!(max_archives, 0);
                assert!(!compress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_write_flags() {
        let cli = Cli::try_parse_from(["rf", "write", "app.log", "-s", "1kb", "-n", "3", "--compress"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Write {
                max_archives: 3,
                compress: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_requires_path() {
        assert!(Cli::try_parse_from(["rf", "list"]).is_err());
    }
}
