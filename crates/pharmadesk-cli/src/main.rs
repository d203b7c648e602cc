//! PharmaDesk CLI - inventory import and catalog queries from the shell
//!
//! This CLI lets an operator:
//! - Import a stock CSV (merge or full replace)
//! - Dry-run an import to see what it would change
//! - Search or page through the catalog and list low-stock items
//! - See the best sellers, all time or this month
//! - Review past imports

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use pharmadesk_core::config::{self, ImportConfig};
use pharmadesk_core::models::month_start;
use pharmadesk_core::{Database, ImportService, ImportSummary, Medicine};

/// PharmaDesk - pharmacy inventory management
#[derive(Parser)]
#[command(name = "pharmadesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file (created if missing)
    #[arg(long, env = "PHARMADESK_DB", default_value = "pharmadesk.db", global = true)]
    db: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a stock CSV to the catalog
    Import {
        file: PathBuf,
        /// Delete catalog entries missing from the file (sold items are kept)
        #[arg(long)]
        replace: bool,
    },

    /// Show what importing a stock CSV would change, without writing
    Preview {
        file: PathBuf,
        #[arg(long)]
        replace: bool,
        /// Rows to echo back
        #[arg(long, default_value_t = config::DEFAULT_PREVIEW_ROW_LIMIT)]
        rows: usize,
    },

    /// Search medicines whose name contains the query
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Match whole-word prefixes in name or manufacturer instead
        #[arg(long)]
        words: bool,
    },

    /// Page through the catalog in name order
    Inventory {
        /// Only names containing this text
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },

    /// Most dispensed medicines
    Top {
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Only count sales since the start of this month (UTC)
        #[arg(long)]
        month: bool,
    },

    /// List medicines at or below a stock threshold
    LowStock {
        #[arg(long, default_value_t = 10)]
        threshold: i64,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Total value of stock on hand
    Value,

    /// Recent imports, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut db = Database::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;
    tracing::debug!(db = %cli.db.display(), "Database opened");

    match cli.command {
        Commands::Import { file, replace } => {
            let (name, data) = read_upload(&file)?;
            let summary = ImportService::default().quick(&mut db, &name, &data, replace)?;
            emit(cli.json, &summary, |s| println!("{}", s.message()))
        }
        Commands::Preview {
            file,
            replace,
            rows,
        } => {
            let (name, data) = read_upload(&file)?;
            let service = ImportService::new(ImportConfig {
                preview_row_limit: rows,
                ..Default::default()
            });
            let preview = service.preview(&db, &name, &data, replace)?;
            emit(cli.json, &preview, |p| {
                println!("{} ({} rows, sha256 {})", p.file_name, p.total, p.file_sha256);
                for row in &p.rows {
                    println!(
                        "  {:<32} qty={:<8} mrp={}",
                        row.name,
                        fmt_opt(row.stock_qty),
                        fmt_opt(row.mrp)
                    );
                }
                if p.total > p.rows.len() as u64 {
                    println!("  ... {} more", p.total - p.rows.len() as u64);
                }
                println!("Planned: {}", p.planned.message());
                print_duplicates(&p.planned);
            })
        }
        Commands::Search {
            query,
            limit,
            words,
        } => {
            let items = if words {
                db.search_medicines_by_word(&query, limit)?
            } else {
                db.search_medicines(&query, limit)?
            };
            emit(cli.json, &items, |items| print_medicines(items))
        }
        Commands::Inventory {
            query,
            page,
            per_page,
        } => {
            let page = db.list_medicines_page(&query, page, per_page)?;
            emit(cli.json, &page, |p| {
                print_medicines(&p.items);
                println!("Page {} of {} ({} medicines)", p.page, p.total_pages, p.total);
            })
        }
        Commands::Top { limit, month } => {
            let since = month.then(|| month_start(Utc::now()));
            let entries = db.top_dispensed(since, limit)?;
            emit(cli.json, &entries, |entries| {
                if entries.is_empty() {
                    println!("No sales recorded.");
                }
                for e in entries {
                    println!("  {:<40} {}", e.name, e.qty);
                }
            })
        }
        Commands::LowStock { threshold, limit } => {
            let items = db.low_stock_medicines(threshold, limit)?;
            emit(cli.json, &items, |items| print_medicines(items))
        }
        Commands::Value => {
            let value = db.inventory_value()?;
            emit(cli.json, &value, |v| println!("{v:.2}"))
        }
        Commands::History { limit } => {
            let records = db.recent_imports(limit)?;
            emit(cli.json, &records, |records| {
                for r in records {
                    println!("#{} {} {} | {}", r.id, r.applied_at, r.file_name, r.summary.message());
                }
            })
        }
    }
}

/// Read an upload from disk, keeping its file name for the `.csv` check.
fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((name, data))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_medicines(items: &[Medicine]) {
    if items.is_empty() {
        println!("No medicines found.");
        return;
    }
    for m in items {
        println!(
            "{:>5}  {:<40} stock={:<6} mrp={:.2}{}",
            m.id,
            m.label(),
            m.stock_qty,
            m.mrp,
            if m.is_low_stock() { "  LOW" } else { "" }
        );
    }
}

fn print_duplicates(summary: &ImportSummary) {
    if summary.duplicates > 0 {
        println!("Note: {} rows repeat an earlier name; the last one wins.", summary.duplicates);
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}
