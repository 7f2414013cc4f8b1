//! matchday - cache-first companion CLI for prediction leagues

use clap::Parser;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod fetch;
mod output;
mod prewarm;
mod read_path;

use cli::{CacheCommands, Cli, Commands, GlobalOptions};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` when set, otherwise warnings; `--debug` raises our own
/// modules to debug either way.
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_module("matchday", log::LevelFilter::Debug);
    }
    builder.init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("matchday version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Prewarm { timeout } => cli::prewarm::run(&opts, timeout).await,
        Commands::Standings { league, gameweek } => {
            cli::standings::run(&opts, &league, gameweek).await
        }
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
            CacheCommands::Invalidate {
                prefix,
                exact,
                league,
            } => match (prefix, league) {
                (_, Some(league)) => cli::cache::invalidate_league(&opts, &league),
                (Some(key), None) if exact => cli::cache::invalidate_key(&opts, &key),
                (Some(prefix), None) => cli::cache::invalidate(&opts, &prefix),
                (None, None) => Ok(()),
            },
            CacheCommands::Purge => cli::cache::purge(&opts),
        },
    }
}
