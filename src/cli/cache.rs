//! Cache management commands

use colored::Colorize;
use serde::Serialize;

use crate::cache::SqliteBackend;
use crate::cli::OutputFormat;
use crate::error::{CacheError, Error, Result};
use crate::output::formatters::{format_local, format_size};
use crate::output::json;

fn cache_error(e: CacheError) -> Error {
    Error::Other(e.to_string())
}

fn open() -> Result<SqliteBackend> {
    SqliteBackend::open().map_err(cache_error)
}

fn cache_path() -> String {
    SqliteBackend::cache_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Serialize)]
struct StatusOutput {
    path: String,
    total_entries: usize,
    valid_entries: usize,
    expired_entries: usize,
    total_size_bytes: usize,
    total_size_human: String,
    oldest_entry: Option<String>,
    newest_entry: Option<String>,
}

/// `cache status`
pub fn status(format: OutputFormat) -> Result<()> {
    let stats = open()?.stats().map_err(cache_error)?;

    match format {
        OutputFormat::Json => {
            let out = StatusOutput {
                path: cache_path(),
                total_entries: stats.total_entries,
                valid_entries: stats.valid_entries,
                expired_entries: stats.expired_entries,
                total_size_bytes: stats.total_size_bytes,
                total_size_human: format_size(stats.total_size_bytes),
                oldest_entry: stats.oldest_entry.map(|t| t.to_rfc3339()),
                newest_entry: stats.newest_entry.map(|t| t.to_rfc3339()),
            };
            println!("{}", json::format_json(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", "Cache Status".bold());
            println!("────────────────────────────────────────");
            println!("Location:       {}", cache_path());
            println!("Valid entries:  {}", stats.valid_entries);
            println!("Expired:        {}", stats.expired_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));
            if let Some(oldest) = stats.oldest_entry {
                println!("Oldest entry:   {}", format_local(oldest));
            }
            if let Some(newest) = stats.newest_entry {
                println!("Newest entry:   {}", format_local(newest));
            }
        }
    }

    Ok(())
}

/// `cache clear`
pub fn clear(format: OutputFormat) -> Result<()> {
    let stats = open()?.clear_all().map_err(cache_error)?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", json::format_json(&out)?);
        }
        OutputFormat::Table => {
            if stats.entries_removed > 0 {
                println!("Cleared {} cache entries", stats.entries_removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// `cache path`
pub fn path() -> Result<()> {
    let path = SqliteBackend::cache_dir().map_err(cache_error)?;
    println!("{}", path.display());
    Ok(())
}
