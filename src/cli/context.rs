//! Command execution context
//!
//! Loads the config, resolves the agent/deployment scope and builds the
//! per-scope sync facade so each command starts from one call.

use std::sync::Arc;

use log::{debug, warn};

use crate::cache::{CacheBackend, SqliteBackend};
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::client::LangGraphClient;
use crate::config::Config;
use crate::error::Result;
use crate::sync::ThreadSync;

/// Context for command execution
pub struct CommandContext {
    pub config: Config,
    pub sync: ThreadSync<LangGraphClient>,
    pub format: OutputFormat,
    timings: bool,
}

impl CommandContext {
    /// Load config, apply overrides and open the durable cache unless `--no-cache`.
    ///
    /// A cache that cannot be opened is logged and skipped.
    pub async fn new(opts: &GlobalOptions) -> Result<Self> {
        let mut config = Config::load_at(opts.config_ref())?;
        if let Some(token) = &opts.token {
            config.access_token = Some(token.clone());
        }

        let token = config.require_token()?.to_string();
        let target = config.resolve_target(opts.agent_ref(), opts.deployment_ref())?;
        debug!("Using {} at {}", target.scope, target.base_url);

        let client = Arc::new(LangGraphClient::new(target.base_url, Some(token))?);

        let backend: Option<Arc<dyn CacheBackend>> = if opts.no_cache {
            None
        } else {
            match SqliteBackend::open() {
                Ok(storage) => Some(Arc::new(storage)),
                Err(e) => {
                    warn!("Cache unavailable, continuing without it: {}", e);
                    None
                }
            }
        };

        let sync = ThreadSync::new(client, target.scope, config.sync.to_options(), backend);

        Ok(Self {
            config,
            sync,
            format: opts.format,
            timings: opts.timings,
        })
    }

    /// Print collected timings to stderr when `--timings` was given.
    pub fn report_timings(&self) {
        if self.timings {
            eprintln!("{}", self.sync.perf().report());
        }
    }
}
