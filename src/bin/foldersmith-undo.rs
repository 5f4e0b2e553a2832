// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Foldersmith Undo Utility
//!
//! Reverses moves recorded in the audit log, newest first.

use clap::Parser;
use std::path::PathBuf;

use foldersmith::audit::{AuditLog, UndoOutcome};
use foldersmith::Result;

#[derive(Parser, Debug)]
#[command(name = "foldersmith-undo")]
#[command(version)]
#[command(about = "Undo Foldersmith moves")]
struct Args {
    /// Path to the audit log
    #[arg(short, long, default_value = "logs/file_organizer.json")]
    log_file: PathBuf,

    /// Number of moves to undo (default: 1, use 0 for all)
    #[arg(short, long, default_value = "1")]
    count: usize,

    /// Dry run - show what would be undone without doing it
    #[arg(long)]
    dry_run: bool,

    /// List all entries in the log
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "debug" } else { "warn" })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !args.log_file.exists() {
        eprintln!("Audit log not found: {:?}", args.log_file);
        eprintln!("No moves to undo.");
        return Ok(());
    }

    let mut log = AuditLog::open(&args.log_file)?;
    if log.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    if args.list {
        println!("Move History ({} entries):", log.len());
        println!("{:-<80}", "");
        for (i, entry) in log.entries().iter().rev().enumerate() {
            println!(
                "{:3}. [{}] {} -> {}",
                i + 1,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.source.display(),
                entry.destination.display()
            );
            if let Some(hash) = &entry.file_hash {
                println!("     sha256: {}", hash);
            }
        }
        return Ok(());
    }

    let count = if args.count == 0 {
        log.len()
    } else {
        args.count.min(log.len())
    };

    println!(
        "{}Undoing {} move(s)...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        count
    );

    if args.dry_run {
        let mut blocked = 0;
        for entry in log.recent(count).iter().rev() {
            if !entry.destination.exists() {
                eprintln!("  Skip: {} (file not found, may have been moved/deleted)", entry.destination.display());
                blocked += 1;
            } else if entry.source.exists() {
                eprintln!("  Skip: {} (original path already exists)", entry.source.display());
                blocked += 1;
            } else {
                println!("  Would move: {} -> {}", entry.destination.display(), entry.source.display());
            }
        }
        println!();
        println!("Dry run complete. {} move(s) would be undone.", count - blocked);
        return Ok(());
    }

    // One step at a time; a blocked entry stops the walk since older entries sit behind it
    let mut undone = 0;
    for _ in 0..count {
        match log.undo_last() {
            UndoOutcome::Reverted(entry) => {
                println!("  Undone: {} -> {}", entry.destination.display(), entry.source.display());
                undone += 1;
            }
            UndoOutcome::Empty => break,
            UndoOutcome::DestinationMissing(path) => {
                eprintln!("  Stop: {} (file not found, may have been moved/deleted)", path.display());
                break;
            }
            UndoOutcome::SourceOccupied(path) => {
                eprintln!("  Stop: {} (original path already exists)", path.display());
                break;
            }
            UndoOutcome::Failed(reason) => {
                eprintln!("  Failed: {}", reason);
                break;
            }
        }
    }

    println!();
    println!("Done. {} of {} undone.", undone, count);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["foldersmith-undo"]).unwrap();
        assert_eq!(args.log_file, PathBuf::from("logs/file_organizer.json"));
        assert_eq!(args.count, 1);
        assert!(!args.dry_run && !args.list && !args.verbose);
    }
}
