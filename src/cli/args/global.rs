//! Global CLI options shared across all commands

use crate::cli::{Cli, OutputFormat};

/// Global flags, captured once after parsing.
///
/// Precedence is CLI flag > environment variable > config file > default. This
/// struct holds the flag/env layer; config defaults are applied in
/// `CommandContext`.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub format: OutputFormat,

    /// Agent (assistant) ID override
    pub agent: Option<String>,

    /// Deployment ID override
    pub deployment: Option<String>,

    /// Access token override
    pub token: Option<String>,

    /// Custom config file path (defaults to ~/.agent-inbox/config.yaml)
    pub config: Option<String>,

    /// Skip the durable cache for this run
    pub no_cache: bool,

    /// Print operation timings to stderr when done
    pub timings: bool,
}

impl GlobalOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            agent: cli.agent.clone(),
            deployment: cli.deployment.clone(),
            token: cli.token.clone(),
            config: cli.config.clone(),
            no_cache: cli.no_cache,
            timings: cli.timings,
        }
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn agent_ref(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn deployment_ref(&self) -> Option<&str> {
        self.deployment.as_deref()
    }
}
