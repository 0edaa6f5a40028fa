// defectdesk - command-line client for the defect tracker
//
// Startup order:
// - `config` subcommands run first, before anything touches the network
// - load configuration (env > file > defaults), then install logging
// - build the AppContext and bootstrap the persisted session
// - dispatch the command

use anyhow::{Context, Result};
use clap::Parser;

use defectdesk::cli::{self, Cli, Commands};
use defectdesk::config::{Config, VERSION};
use defectdesk::{logging, AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { show, reset, path } = cli.command {
        return cli::handle_config(show, reset, path);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env()?;
    if let Some(api) = &cli.api {
        config.api_base_url = api.clone();
    }

    // Guard flushes file logs on drop; keep it for the whole run
    let _file_guard = logging::init_tracing(&config.logging, cli.verbose.then_some("debug"));

    tracing::debug!(
        "defectdesk {} against {} (locale {})",
        VERSION,
        config.api_base_url,
        config.locale
    );

    let app = AppContext::from_config(&config, cli.ephemeral)
        .with_context(|| format!("cannot use API base URL {:?}", config.api_base_url))?;

    let phase = app.session.bootstrap().await;
    tracing::debug!("Session phase after bootstrap: {:?}", phase);

    cli::run(&app, cli.command).await
}
