//! Thread commands

use chrono::{Local, Utc};
use colored::Colorize;
use log::debug;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::cli::context::CommandContext;
use crate::client::models::{
    HumanResponse, HumanResponseKind, Inbox, MAX_SEARCH_LIMIT, ThreadDetail, ThreadFilter,
};
use crate::error::{Error, Result};
use crate::models::{InterruptDisplay, ThreadDisplay, group_history};
use crate::output::{json, table};

/// `threads list`
pub async fn list(
    opts: &GlobalOptions,
    inbox: Option<Inbox>,
    offset: usize,
    limit: Option<usize>,
    refresh: bool,
) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;
    let prefs = &ctx.config.preferences;
    let filter = ThreadFilter::new(
        inbox.unwrap_or(prefs.inbox),
        offset,
        limit.unwrap_or(prefs.limit),
    );
    debug!("Listing {:?}", filter);

    let page = if refresh {
        ctx.sync.refresh(&filter).await?
    } else {
        ctx.sync.fetch_threads(&filter).await?
    };

    match ctx.format {
        OutputFormat::Json => {
            println!(
                "{}",
                json::format_page(&page.threads, page.from_cache, page.has_more)?
            );
        }
        OutputFormat::Table => {
            let now = Utc::now();
            let rows: Vec<ThreadDisplay> = page
                .threads
                .iter()
                .map(|d| ThreadDisplay::from_detail(d, now))
                .collect();
            println!("{}", table::format_table(&rows));

            let mut notes = Vec::new();
            if page.from_cache {
                notes.push("cached".to_string());
            }
            if page.has_more {
                notes.push(format!("more with --offset {}", filter.offset + filter.limit));
            }
            if !notes.is_empty() {
                println!("{}", format!("({})", notes.join("; ")).dimmed());
            }
        }
    }

    // Let a stale-page refresh land in the cache before exiting.
    ctx.sync.settle().await;
    ctx.report_timings();
    Ok(())
}

/// `threads show`
pub async fn show(opts: &GlobalOptions, thread_id: &str) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;

    let detail = ctx
        .sync
        .fetch_thread_detail(thread_id)
        .await?
        .ok_or_else(|| Error::Other(format!("Thread {} not found", thread_id)))?;

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&detail)?),
        OutputFormat::Table => print_detail(&detail),
    }

    ctx.report_timings();
    Ok(())
}

fn print_detail(detail: &ThreadDetail) {
    let thread = &detail.thread;
    println!("{} {}", "Thread".bold(), thread.thread_id.cyan());
    println!("Status:   {}", detail.status.as_str());
    println!(
        "Created:  {}",
        crate::output::formatters::format_local(thread.created_at)
    );
    let message = thread.first_human_message();
    if !message.is_empty() {
        println!("Message:  {}", message);
    }
    println!();

    if detail.degraded {
        println!(
            "{} Interrupt details are unavailable right now; try again shortly.",
            "⚠".yellow()
        );
    } else if detail.invalid_schema {
        println!(
            "{} This thread's interrupt data is not in a format the inbox can show.",
            "✗".red()
        );
    } else if let Some(found) = &detail.interrupts {
        let rows: Vec<InterruptDisplay> = found.iter().map(InterruptDisplay::from).collect();
        println!("{}", table::format_table(&rows));
    }
}

/// `threads ignore`
pub async fn ignore(opts: &GlobalOptions, thread_id: &str) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;
    ctx.sync.ignore_thread(thread_id).await?;

    match ctx.format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "thread_id": thread_id, "ignored": true });
            println!("{}", json::format_json(&out)?);
        }
        OutputFormat::Table => println!("{} Ignored thread {}", "✓".green(), thread_id),
    }

    ctx.report_timings();
    Ok(())
}

/// Parse `--args`: JSON when it parses, otherwise the raw text.
fn parse_args(kind: HumanResponseKind, args: Option<&str>) -> Value {
    match args {
        None if kind == HumanResponseKind::Response => Value::String(String::new()),
        None => Value::Null,
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

/// `threads respond`
pub async fn respond(
    opts: &GlobalOptions,
    thread_id: &str,
    kind: HumanResponseKind,
    args: Option<&str>,
) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;

    let response = HumanResponse {
        kind,
        args: parse_args(kind, args),
    };
    let run = ctx.sync.send_response(thread_id, vec![response]).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&run)?),
        OutputFormat::Table => println!(
            "{} Resumed thread {} (run {})",
            "✓".green(),
            thread_id,
            run.run_id.cyan()
        ),
    }

    ctx.report_timings();
    Ok(())
}

/// `threads history`
pub async fn history(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;

    let filter = ThreadFilter::new(Inbox::All, 0, MAX_SEARCH_LIMIT);
    let page = ctx.sync.fetch_threads(&filter).await?;
    let threads: Vec<_> = page.threads.into_iter().map(|d| d.thread).collect();
    let sections = group_history(&threads, Local::now().date_naive());

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            json::format_page(&sections, page.from_cache, page.has_more)?
        ),
        OutputFormat::Table => {
            if sections.is_empty() {
                println!("No threads yet.");
            }
            for section in &sections {
                if let Some(out) = table::format_section(section.group.label(), &section.threads) {
                    println!("{}\n", out);
                }
            }
        }
    }

    ctx.sync.settle().await;
    ctx.report_timings();
    Ok(())
}
