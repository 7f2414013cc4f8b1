//! Init command implementation

use colored::Colorize;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

use crate::cli::GlobalOptions;
use crate::client::{LeagueSource, RestSource};
use crate::config::{BackendConfig, Config};
use crate::error::Result;

/// Run the init command
///
/// Prompts for the backend connection and the viewer, checks them by
/// listing the viewer's leagues, and writes the config file. Existing
/// preferences and cache settings are kept.
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let theme = ColorfulTheme::default();
    let mut config = Config::load_at(opts.config_ref()).unwrap_or_default();
    let existing = config.backend.clone();

    println!("{}", "Welcome to matchday!".bold().green());
    println!("Let's connect to your league backend.\n");

    let url: String = Input::with_theme(&theme)
        .with_prompt("Backend URL")
        .with_initial_text(
            opts.backend_url
                .clone()
                .or_else(|| existing.as_ref().map(|b| b.url.clone()))
                .unwrap_or_default(),
        )
        .interact_text()?;

    let api_key: String = Password::with_theme(&theme)
        .with_prompt("Public API key")
        .interact()?;

    let access_token: String = Password::with_theme(&theme)
        .with_prompt("Access token (leave empty to use the API key)")
        .allow_empty_password(true)
        .interact()?;
    let access_token = (!access_token.trim().is_empty()).then_some(access_token);

    let viewer: String = Input::with_theme(&theme)
        .with_prompt("Your user ID")
        .with_initial_text(
            opts.viewer
                .clone()
                .or_else(|| config.viewer_id.clone())
                .unwrap_or_default(),
        )
        .interact_text()?;

    println!("\n{}", "Checking connection...".cyan());
    let source = RestSource::new(
        &url,
        api_key.clone(),
        access_token.clone(),
        config.preferences.rate_limit,
    )?;

    match source.memberships(&viewer).await {
        Ok(leagues) if leagues.is_empty() => {
            println!("{}", "⚠ Connected, but this user is in no leagues yet.".yellow());
        }
        Ok(leagues) => {
            println!(
                "{} Connected. Found {} league(s):",
                "✓".green(),
                leagues.len()
            );
            for league in &leagues {
                println!("  {} {}", league.name.bold(), league.id.dimmed());
            }
        }
        Err(e) => {
            println!("{} Could not verify: {}", "✗".red(), e);
            let keep = Confirm::with_theme(&theme)
                .with_prompt("Save this configuration anyway?")
                .default(false)
                .interact()?;
            if !keep {
                return Err(e.into());
            }
        }
    }

    config.backend = Some(BackendConfig {
        url,
        api_key,
        access_token,
    });
    config.viewer_id = Some(viewer);
    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Fill the cache for your leagues", "matchday prewarm".cyan());
    println!("  {} - Show a league table", "matchday standings <LEAGUE_ID>".cyan());

    Ok(())
}
