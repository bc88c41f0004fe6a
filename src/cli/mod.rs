//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod context;
pub mod init;
pub mod status;
pub mod threads;

pub use args::OutputFormat;
pub use context::CommandContext;

use crate::client::models::{HumanResponseKind, Inbox};

/// Agent Inbox - review and answer agent threads waiting on a human
#[derive(Parser, Debug)]
#[command(name = "agent-inbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(
        long,
        global = true,
        env = "AGENT_INBOX_FORMAT",
        default_value = "table",
        hide_env = true
    )]
    pub format: OutputFormat,

    /// Agent (assistant) ID, overrides default_agent
    #[arg(long, global = true, env = "AGENT_INBOX_AGENT", hide_env = true)]
    pub agent: Option<String>,

    /// Deployment ID, overrides default_deployment
    #[arg(long, global = true, env = "AGENT_INBOX_DEPLOYMENT", hide_env = true)]
    pub deployment: Option<String>,

    /// Access token, overrides the configured one
    #[arg(
        long,
        global = true,
        env = "AGENT_INBOX_TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// Override config file location
    #[arg(long, global = true, env = "AGENT_INBOX_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "AGENT_INBOX_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Bypass the on-disk cache, fetch fresh data
    #[arg(long, global = true, env = "AGENT_INBOX_NO_CACHE", hide_env = true)]
    pub no_cache: bool,

    /// Print operation timings to stderr
    #[arg(long, global = true)]
    pub timings: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration
    Init,

    /// Show configuration status
    Status,

    /// Display version information
    Version,

    /// Browse and act on agent threads
    #[command(subcommand)]
    Threads(ThreadCommands),

    /// Manage the local response cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    #[command(after_help = "\
EXAMPLES:
  bash:   agent-inbox completion bash > /etc/bash_completion.d/agent-inbox
  zsh:    agent-inbox completion zsh > \"${fpath[1]}/_agent-inbox\"
  fish:   agent-inbox completion fish > ~/.config/fish/completions/agent-inbox.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Thread subcommands
#[derive(Subcommand, Debug)]
pub enum ThreadCommands {
    /// List threads in an inbox
    #[command(
        visible_alias = "ls",
        after_help = "EXAMPLES:\n  \
            agent-inbox threads list                          # Interrupted threads\n  \
            agent-inbox threads list --inbox all --limit 50\n  \
            agent-inbox threads list --inbox human_response_needed\n  \
            agent-inbox threads list --refresh                # Skip cached results"
    )]
    List {
        /// Inbox to show (defaults to preferences.inbox)
        #[arg(long, short = 'i', value_enum)]
        inbox: Option<Inbox>,

        /// Number of threads to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size, at most 100 (defaults to preferences.limit)
        #[arg(long, short = 'l')]
        limit: Option<usize>,

        /// Ignore cached results and reset the failure breaker
        #[arg(long)]
        refresh: bool,
    },

    /// Show one thread with its pending interrupts
    #[command(visible_alias = "g")]
    Show {
        /// Thread ID
        thread_id: String,
    },

    /// Dismiss an interrupted thread without responding
    Ignore {
        /// Thread ID
        thread_id: String,
    },

    /// Answer a thread's pending interrupt
    #[command(after_help = "EXAMPLES:\n  \
            agent-inbox threads respond <id> --type accept\n  \
            agent-inbox threads respond <id> --type response --args \"Looks good\"\n  \
            agent-inbox threads respond <id> --type edit --args '{\"action\":\"send\",\"args\":{}}'")]
    Respond {
        /// Thread ID
        thread_id: String,

        /// Response type
        #[arg(long = "type", short = 't', value_enum)]
        kind: HumanResponseKind,

        /// Response payload as JSON; plain text is sent as a string
        #[arg(long, short = 'a')]
        args: Option<String>,
    },

    /// Recent threads grouped by day
    History,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,

    /// Remove all cached entries
    Clear,

    /// Print the cache directory
    Path,
}
