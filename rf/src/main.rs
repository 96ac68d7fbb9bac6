use std::io::{self, BufRead};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use rollfile::cli::{Cli, Command};
use rollfile::{ArchiveNaming, RollPolicy, RollingFile, format_file_size, parse_size};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    match cli.command {
        Command::Write {
            path,
            max_size,
            max_archives,
            compress,
        } => {
            let max_size = parse_size(&max_size)?;
            let policy = RollPolicy::new(max_size, max_archives).compressed(compress);
            let file = RollingFile::open(&path, policy)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            info!("rf writing to {}", path.display());

            let mut total = 0u64;
            for line in io::stdin().lock().lines() {
                let mut line = line.context("Failed to read stdin")?;
                line.push('\n');
                total += file.write(line.as_bytes())? as u64;
            }
            file.close()?;
            println!(
                "{} Wrote {} to {}",
                "✓".green(),
                format_file_size(total),
                path.display().to_string().cyan()
            );
        }
        Command::Rotate {
            path,
            max_archives,
            compress,
        } => {
            let policy = RollPolicy::new(0, max_archives).compressed(compress);
            let file = RollingFile::open(&path, policy)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.rotate()?;
            file.close()?;
            println!("{} Rotated {}", "✓".green(), path.display().to_string().cyan());
        }
        Command::List { path, compressed } => {
            let naming = ArchiveNaming::new(&path, compressed)?;
            let archives = naming.discover()?;
            if archives.is_empty() {
                println!("No archives found");
            } else {
                for (index, archive) in archives {
                    let size = archive.metadata().map(|m| m.len()).unwrap_or(0);
                    println!(
                        "{} {} {}",
                        index.to_string().yellow(),
                        archive.display(),
                        format_file_size(size).dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}
