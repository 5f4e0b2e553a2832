// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Foldersmith: local AI-assisted file organizer
//!
//! Plans a taxonomy-conformant layout for a directory, then copies or moves files
//! with verified checksums and an undoable audit log.

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use foldersmith::audit::{AuditLog, UndoOutcome};
use foldersmith::config::AppConfig;
use foldersmith::executor::TransferMode;
use foldersmith::ollama::OllamaClient;
use foldersmith::organizer::{render_plan, OrganizeReport, Organizer};
use foldersmith::planner::Plan;
use foldersmith::Result;

/// Foldersmith CLI - local AI file organizer
#[derive(Parser, Debug)]
#[command(name = "foldersmith")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Organize a directory into a fixed taxonomy with verified, undoable moves", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "foldersmith.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan (and optionally perform) the organization of a directory
    Organize {
        /// Directory to organize
        root: PathBuf,

        /// Only show the plan (default)
        #[arg(long, conflicts_with = "execute")]
        dry_run: bool,

        /// Perform the moves after confirmation
        #[arg(short, long)]
        execute: bool,

        /// Output directory (overrides config; relative paths are under ROOT)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Use rule-based suggestions only, without the AI engine
        #[arg(long)]
        offline: bool,
    },

    /// Audit log and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine and audit log status
    Status,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent audit entries
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Undo the most recent move
    Undo,

    /// Clear the audit log
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "foldersmith.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Organize { root, dry_run: _, execute, output, move_files, yes, offline } => {
            run_organize(config, root, !execute, output, move_files, yes, offline, &cli.format).await
        }
        Commands::History { action } => run_history_command(config, action, &cli.format),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_organize(
    mut config: AppConfig,
    root: PathBuf,
    dry_run: bool,
    output: Option<PathBuf>,
    move_files: bool,
    yes: bool,
    offline: bool,
    format: &str,
) -> Result<()> {
    if let Some(output) = output {
        config.organizer.output_dir = output;
    }
    if move_files {
        config.organizer.copy_mode = false;
    }

    let output_root = config.output_root(&root);
    let mode = TransferMode::from_copy_flag(config.organizer.copy_mode);
    info!("Organizing {:?} into {:?} ({:?} mode)", root, output_root, mode);

    let organizer = if offline {
        Organizer::offline(config, &output_root, mode)
    } else {
        Organizer::new(config, &output_root, mode)?
    };

    let text = format == "text";
    let report = organizer
        .organize(&root, dry_run, |plan| {
            if text {
                print_plan(plan, &output_root);
            }
            yes || ask_confirmation()
        })
        .await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report, &output_root, mode);
    Ok(())
}

fn print_plan(plan: &Plan, output_root: &Path) {
    println!("\nOrganization plan:");
    println!("{}", render_plan(plan, output_root));
}

/// Ask on the terminal; anything but an explicit yes declines
fn ask_confirmation() -> bool {
    print!("\nExecute this organization plan? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            warn!("Could not read confirmation: {}", e);
            false
        }
    }
}

fn print_report(report: &OrganizeReport, output_root: &Path, mode: TransferMode) {
    let summary = &report.summary;

    if report.dry_run {
        print_plan(&report.plan, output_root);
        println!(
            "\nDry run complete: {}/{} files would be organized. Use --execute to perform the moves.",
            summary.pending, summary.total
        );
        return;
    }

    for (name, reason) in report.problems() {
        println!("  {}: {}", name, reason);
    }

    let note = match mode {
        TransferMode::Copy => " (originals preserved)",
        TransferMode::Move => "",
    };
    println!(
        "\nOrganization complete! Organized {}/{} files{}",
        summary.organized, summary.total, note
    );
    if summary.skipped > 0 || summary.failed > 0 {
        println!("  Skipped: {}  Failed: {}", summary.skipped, summary.failed);
    }
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands, format: &str) -> Result<()> {
    let mut log = AuditLog::open(&config.organizer.log_path)?;

    match action {
        HistoryCommands::List { count } => {
            let entries = log.recent(count);
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(entries)?);
                return Ok(());
            }
            println!("Recent moves ({} of {}):", entries.len(), log.len());
            for entry in entries {
                println!(
                    "  {} {} -> {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.source.display(),
                    entry.destination.display()
                );
            }
        }
        HistoryCommands::Undo => match log.undo_last() {
            UndoOutcome::Reverted(entry) => {
                println!("Undone: {} -> {}", entry.destination.display(), entry.source.display());
            }
            UndoOutcome::Empty => println!("Nothing to undo"),
            other => {
                eprintln!("Undo failed: {}", describe_failure(&other));
                std::process::exit(1);
            }
        },
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing the audit log");
                return Ok(());
            }
            log.clear()?;
            println!("Audit log cleared");
        }
    }

    Ok(())
}

fn describe_failure(outcome: &UndoOutcome) -> String {
    match outcome {
        UndoOutcome::DestinationMissing(path) => format!("{} no longer exists", path.display()),
        UndoOutcome::SourceOccupied(path) => {
            format!("{} already exists (copied files cannot be undone)", path.display())
        }
        UndoOutcome::Failed(reason) => reason.clone(),
        UndoOutcome::Empty => "nothing to undo".to_string(),
        UndoOutcome::Reverted(_) => "already reverted".to_string(),
    }
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Categories: {}", config.taxonomy.len());
            println!("  Output directory: {:?}", config.organizer.output_dir);
            println!("  Audit log: {:?}", config.organizer.log_path);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Foldersmith v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    if config.ai_engine.enabled {
        let client = OllamaClient::new(&config.ai_engine)?;
        match client.health_check().await {
            Ok(()) => {
                println!("Ollama: Running at {}", client.base_url());
                for model in [&config.ai_engine.models.vision, &config.ai_engine.models.text] {
                    let state = match client.model_available(model).await {
                        Ok(true) => "available",
                        Ok(false) => "missing (ollama pull it first)",
                        Err(_) => "unknown",
                    };
                    println!("  {}: {}", model, state);
                }
            }
            Err(e) => println!("Ollama: Error - {}", e),
        }
    } else {
        println!("Ollama: disabled (rule-based suggestions only)");
    }

    match AuditLog::open(&config.organizer.log_path) {
        Ok(log) => println!("\nAudit log ({:?}): {} entries", log.path(), log.len()),
        Err(e) => println!("\nAudit log: Error - {}", e),
    }

    println!("\nTaxonomy:");
    for (category, subs) in &config.taxonomy {
        println!("  {}/ {}", category, subs.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organize_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["foldersmith", "organize", "/tmp/inbox"]).unwrap();
        assert!(!cli.verbose);

        match cli.command {
            Commands::Organize { root, execute, move_files, yes, offline, output, .. } => {
                assert_eq!(root, PathBuf::from("/tmp/inbox"));
                assert!(!execute);
                assert!(!move_files && !yes && !offline);
                assert!(output.is_none());
            }
            _ => panic!("Expected Organize command"),
        }
    }

    #[test]
    fn test_organize_execute_flags() {
        let cli = Cli::try_parse_from([
            "foldersmith", "organize", "/tmp/inbox", "--execute", "--move", "--yes", "-o", "/tmp/out",
            "--offline", "--format", "json",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Organize { execute, move_files, yes, offline, output, .. } => {
                assert!(execute && move_files && yes && offline);
                assert_eq!(output, Some(PathBuf::from("/tmp/out")));
            }
            _ => panic!("Expected Organize command"),
        }
    }

    #[test]
    fn test_dry_run_conflicts_with_execute() {
        assert!(Cli::try_parse_from(["foldersmith", "organize", ".", "--dry-run", "--execute"]).is_err());
    }

    #[test]
    fn test_history_commands() {
        let cli = Cli::try_parse_from(["foldersmith", "history", "list", "-n", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History { action: HistoryCommands::List { count: 3 } }
        ));

        let cli = Cli::try_parse_from(["foldersmith", "history", "clear", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History { action: HistoryCommands::Clear { force: true } }
        ));
    }

    #[test]
    fn test_history_list_defaults_and_global_config() {
        let cli = Cli::try_parse_from(["foldersmith", "history", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History { action: HistoryCommands::List { count: 10 } }
        ));

        let cli = Cli::try_parse_from(["foldersmith", "history", "list", "-c", "alt.json", "--count", "2"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.json"));
        assert!(matches!(
            cli.command,
            Commands::History { action: HistoryCommands::List { count: 2 } }
        ));
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["foldersmith", "--format", "xml", "status"]).is_err());
    }
}
