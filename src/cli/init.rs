//! Init command implementation

use colored::Colorize;
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::client::models::{Inbox, Scope, ThreadFilter};
use crate::client::{LangGraphClient, ThreadReadApi};
use crate::config::Config;
use crate::error::Result;

const INBOXES: [Inbox; 6] = [
    Inbox::Interrupted,
    Inbox::HumanResponseNeeded,
    Inbox::All,
    Inbox::Idle,
    Inbox::Busy,
    Inbox::Error,
];

/// Run the interactive setup and write the config file.
///
/// Existing deployments are kept; the one entered here becomes the default.
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}", "Welcome to Agent Inbox!".bold().green());
    println!("Let's connect to your agent deployment.\n");

    let theme = ColorfulTheme::default();
    let mut config = Config::load_at(opts.config_ref()).unwrap_or_default();

    let deployment_url: String = Input::with_theme(&theme)
        .with_prompt("Deployment URL")
        .interact_text()?;

    let deployment_id: String = Input::with_theme(&theme)
        .with_prompt("Name for this deployment")
        .default(
            opts.deployment
                .clone()
                .or_else(|| config.default_deployment.clone())
                .unwrap_or_else(|| "default".to_string()),
        )
        .interact_text()?;

    let agent_id: String = Input::with_theme(&theme)
        .with_prompt("Agent (assistant) ID")
        .default(
            opts.agent
                .clone()
                .or_else(|| config.default_agent.clone())
                .unwrap_or_else(|| "agent".to_string()),
        )
        .interact_text()?;

    let token = match &opts.token {
        Some(token) => token.clone(),
        None => Password::with_theme(&theme)
            .with_prompt("Access token")
            .interact()?,
    };

    let inbox_names: Vec<&str> = INBOXES.iter().map(Inbox::as_str).collect();
    let inbox = Select::with_theme(&theme)
        .with_prompt("Default inbox")
        .items(&inbox_names)
        .default(0)
        .interact_opt()?
        .map(|idx| INBOXES[idx])
        .unwrap_or_default();

    println!("\n{}", "Checking the deployment...".cyan());
    let client = LangGraphClient::new(deployment_url.clone(), Some(token.clone()))?;
    let probe = ThreadFilter::new(Inbox::All, 0, 1);
    client
        .search_threads(&Scope::new(agent_id.clone(), deployment_id.clone()), &probe)
        .await?;
    println!("{}", "✓ Connected".green());

    config.access_token = Some(token);
    config
        .deployments
        .insert(deployment_id.clone(), deployment_url);
    config.default_deployment = Some(deployment_id);
    config.default_agent = Some(agent_id);
    config.preferences.inbox = inbox;
    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "agent-inbox status".cyan());
    println!(
        "  {} - Threads waiting on you",
        "agent-inbox threads list".cyan()
    );

    Ok(())
}
