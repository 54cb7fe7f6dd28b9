//! chronoql CLI - Compile SQL statements to query models
//!
//! Usage:
//!   chronoql compile "<sql>" [--catalog <file>] [--config <file>] [--format text|json] [--verbose]
//!   chronoql check [<file>] [--catalog <file>] [--config <file>]
//!
//! Examples:
//!   chronoql compile "select sym, avg(price) from trades sample by 1h" --catalog tables.toml
//!   chronoql check statements.sql --catalog tables.toml
//!   cat statements.sql | chronoql check --catalog tables.toml

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use chronoql::cache::AssociativeCache;
use chronoql::catalog::MemoryCatalog;
use chronoql::compiler::Compiler;
use chronoql::config::Settings;
use chronoql::error::SqlError;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronoql")]
#[command(about = "chronoql - Compile time-series SQL into canonical query models")]
#[command(version)]
struct Cli {
    /// Catalog file describing the tables (overrides the config file)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Settings file (defaults to CHRONOQL_CONFIG, ./chronoql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log compiler stages at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one statement and print its model
    Compile {
        /// The SQL statement
        sql: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Compile one statement per line and report each one's status
    Check {
        /// File of statements (reads stdin if not specified)
        file: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Canonical model text
    Text,
    /// Model tree as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let catalog = match load_catalog(cli.catalog.as_deref(), &settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile { sql, format } => cmd_compile(&sql, format, cli.verbose, &catalog, &settings),
        Commands::Check { file } => cmd_check(file, &catalog, &settings),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
    .map_err(|e| e.to_string())
}

fn load_catalog(path: Option<&Path>, settings: &Settings) -> Result<MemoryCatalog, String> {
    let configured = settings.catalog_path().map_err(|e| e.to_string())?;
    match path.map(Path::to_path_buf).or(configured) {
        Some(path) => MemoryCatalog::from_file(&path)
            .map_err(|e| format!("'{}': {}", path.display(), e)),
        None => Ok(MemoryCatalog::new()),
    }
}

/// Print `err` against the statement text, pointing at its position.
fn report_error(sql: &str, err: &SqlError) {
    let end = (err.position + 1).min(sql.len());
    let start = err.position.min(end);
    let printed = Report::build(ReportKind::Error, start..end)
        .with_config(Config::default().with_index_type(IndexType::Byte))
        .with_message(err.message())
        .with_label(
            Label::new(start..end)
                .with_message(format!("at position {}", err.position))
                .with_color(Color::Red),
        )
        .finish()
        .eprint(Source::from(sql));
    if printed.is_err() {
        eprintln!("{}", err);
    }
}

fn cmd_compile(
    sql: &str,
    format: OutputFormat,
    verbose: bool,
    catalog: &MemoryCatalog,
    settings: &Settings,
) -> ExitCode {
    let compiler = Compiler::with_settings(catalog, settings.compiler.clone());
    let compiled = match compiler.compile(sql) {
        Ok(c) => c,
        Err(e) => {
            report_error(sql, &e);
            return ExitCode::FAILURE;
        }
    };

    match format {
        OutputFormat::Text => println!("{}", compiled),
        OutputFormat::Json => match serde_json::to_string_pretty(&compiled) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing model: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    if verbose {
        println!("-- fingerprint: {}", compiled.fingerprint());
    }
    ExitCode::SUCCESS
}

fn cmd_check(file: Option<PathBuf>, catalog: &MemoryCatalog, settings: &Settings) -> ExitCode {
    let input = match &file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
    };
    let input = match input {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading statements: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut seen = match AssociativeCache::from_settings(&settings.cache) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating cache: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let compiler = Compiler::with_settings(catalog, settings.compiler.clone());
    let mut failures = 0;
    for (index, line) in input.lines().enumerate() {
        let sql = line.trim();
        if sql.is_empty() || sql.starts_with("--") {
            continue;
        }
        let line_no = index + 1;
        match compiler.compile(sql) {
            Ok(compiled) => {
                let key = compiled.fingerprint();
                match seen.peek(&key).copied() {
                    Some(first) => println!("{:>4}: ok (same model as line {})", line_no, first),
                    None => {
                        seen.put(key, line_no);
                        println!("{:>4}: ok", line_no);
                    }
                }
            }
            Err(e) => {
                failures += 1;
                println!("{:>4}: error", line_no);
                report_error(sql, &e);
            }
        }
    }

    if failures > 0 {
        eprintln!("{} statement(s) failed", failures);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
