//! Status command implementation

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::Result;

/// Show which config is in use and whether it is complete.
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "Agent Inbox Configuration Status".bold());

    let config = match Config::load_at(opts.config_ref()) {
        Ok(config) => config,
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!(
                "Run {} to create a configuration file.",
                "agent-inbox init".cyan()
            );
            println!();
            return Ok(());
        }
    };

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!("Config file: {}", config_path.display().to_string().cyan());
    println!();

    if opts.token.is_some() {
        println!("{} Access token provided via --token", "✓".green());
    } else if config.require_token().is_ok() {
        println!("{} Access token configured", "✓".green());
    } else {
        println!("{} Access token not configured", "✗".red());
        println!("  → Run 'agent-inbox init' to configure");
    }

    match config.resolve_target(opts.agent_ref(), opts.deployment_ref()) {
        Ok(target) => {
            println!("{} Agent: {}", "✓".green(), target.scope.agent_id);
            println!(
                "{} Deployment: {} ({})",
                "✓".green(),
                target.scope.deployment_id,
                target.base_url.cyan()
            );
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
        }
    }

    let others: Vec<&str> = config
        .deployments
        .keys()
        .map(String::as_str)
        .filter(|id| Some(*id) != config.default_deployment.as_deref())
        .collect();
    if !others.is_empty() {
        println!();
        println!("Other deployments: {}", others.join(", ").dimmed());
    }

    println!(
        "{} Default inbox: {} (page size {})",
        "○".dimmed(),
        config.preferences.inbox,
        config.preferences.limit
    );
    println!();

    Ok(())
}
