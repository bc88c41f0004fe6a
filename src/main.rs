//! Agent Inbox CLI - review and answer agent threads waiting on a human

use clap::{CommandFactory, Parser};
use log::LevelFilter;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod output;
mod sync;

use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands, ThreadCommands};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        if err.is_silent() {
            std::process::exit(130);
        }
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `--debug` wins; otherwise `RUST_LOG`, defaulting to warnings only.
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("agent-inbox version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Threads(cmd) => match cmd {
            ThreadCommands::List {
                inbox,
                offset,
                limit,
                refresh,
            } => cli::threads::list(&opts, inbox, offset, limit, refresh).await,
            ThreadCommands::Show { thread_id } => cli::threads::show(&opts, &thread_id).await,
            ThreadCommands::Ignore { thread_id } => cli::threads::ignore(&opts, &thread_id).await,
            ThreadCommands::Respond {
                thread_id,
                kind,
                args,
            } => cli::threads::respond(&opts, &thread_id, kind, args.as_deref()).await,
            ThreadCommands::History => cli::threads::history(&opts).await,
        },
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(opts.format),
            CacheCommands::Clear => cli::cache::clear(opts.format),
            CacheCommands::Path => cli::cache::path(),
        },
        Commands::Completion { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "agent-inbox",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
