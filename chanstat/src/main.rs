//! chanstat - CLI tool to collect IRC channel statistics from log files
//!
//! Each log file covers one date. Files are parsed in the order given and
//! merged into the chanstat database; a rerun on a growing log resumes after
//! the last line already counted.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/chanstat/data.db (~/.local/share/chanstat/data.db)
//! - Logs: $XDG_STATE_HOME/chanstat/chanstat.log (~/.local/state/chanstat/chanstat.log)
//! - Config: $XDG_CONFIG_HOME/chanstat/config.toml (~/.config/chanstat/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use chanstat_core::ingest::{date_from_filename, LogIngest, ParseReport};
use chanstat_core::{Config, Database, LogFormat};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use process_lock::acquire_parse_guard;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chanstat")]
#[command(about = "Collect IRC channel statistics from log files")]
#[command(version)]
struct Args {
    /// Log format (irssi, mirc); overrides the config file
    #[arg(short, long)]
    format: Option<String>,

    /// Date the logs cover (YYYY-MM-DD); taken from the file name otherwise
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// First line to parse; the stored resume offset is used otherwise
    #[arg(long)]
    from_line: Option<u64>,

    /// Verbose output (-v per-file details, -vv top talkers)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log files to parse, plain or gzip-compressed
    #[arg(required = true)]
    logfiles: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(format) = &args.format {
        config.parser.format = format
            .parse::<LogFormat>()
            .with_context(|| format!("invalid --format value: {}", format))?;
    }

    // Initialize logging
    let _log_guard =
        chanstat_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(files = args.logfiles.len(), "chanstat starting");

    // Resolve every log date up front so a bad name fails before anything is written.
    let jobs = args
        .logfiles
        .iter()
        .map(|path| {
            let date = args
                .date
                .or_else(|| date_from_filename(path))
                .with_context(|| {
                    format!(
                        "no date in file name {}; pass --date YYYY-MM-DD",
                        path.display()
                    )
                })?;
            Ok((path.clone(), date))
        })
        .collect::<Result<Vec<_>>>()?;

    // Resolve database path and enforce process-level exclusivity for it.
    let db_path = Config::database_path();
    let _parse_guard = acquire_parse_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    if args.verbose > 0 {
        println!("Database: {}", db_path.display());
        println!("Format: {}", config.parser.format);
    }

    let ingest = LogIngest::new(db, config.parser);

    let mut totals = Totals::default();
    for (path, date) in &jobs {
        let report = ingest
            .ingest_file(path, *date, args.from_line)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        print_report(&report, args.verbose);
        totals.add(&report);
    }

    println!("\nParse complete:");
    println!("  Files parsed:      {}", totals.files);
    println!("  Messages counted:  {}", totals.messages);
    println!("  Up to date:        {}", totals.up_to_date);
    if totals.warnings > 0 {
        println!("  Events skipped:    {}", totals.warnings);
    }

    if args.verbose >= 2 {
        let top = ingest
            .sink()
            .top_talkers(10)
            .context("failed to query top talkers")?;
        if !top.is_empty() {
            println!("\nTop talkers:");
            for (rank, (nick, lines)) in top.iter().enumerate() {
                println!("  {:>2}. {:<20} {}", rank + 1, nick, lines);
            }
        }
    }

    tracing::info!(
        files = totals.files,
        messages = totals.messages,
        warnings = totals.warnings,
        "chanstat finished"
    );

    Ok(())
}

#[derive(Default)]
struct Totals {
    files: usize,
    messages: u64,
    warnings: u64,
    up_to_date: usize,
}

impl Totals {
    fn add(&mut self, report: &ParseReport) {
        self.files += 1;
        self.messages += report.messages;
        self.warnings += report.warnings;
        if report.is_up_to_date() {
            self.up_to_date += 1;
        }
    }
}

fn print_report(report: &ParseReport, verbose: u8) {
    if report.is_up_to_date() {
        println!("{}: up to date", report.path.display());
        return;
    }

    println!(
        "{}: {} message(s), lines {}..{}",
        report.path.display(),
        report.messages,
        report.first_line,
        report.next_line
    );

    if verbose > 0 {
        println!("    Date:     {}", report.date);
        println!("    Nicks:    {}", report.nicks);
        println!("    Words:    {}", report.words);
        println!("    Skipped:  {}", report.warnings);
    }
}
