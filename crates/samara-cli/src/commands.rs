use anyhow::Result;
use clap::CommandFactory;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use samara_core::MindPaths;

use super::args::{Cli, Commands};
use super::handlers;

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_level);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let paths = MindPaths::resolve(cli.mind_path.as_deref())?;
    tracing::debug!(component = "cli", mind_root = %paths.root().display(), "resolved mind root");

    match command {
        Commands::Stream { command } => handlers::stream::handle(&paths, command, cli.format),
        Commands::Digest {
            hours,
            max_tokens,
            summarize,
            output,
            cache_ttl,
        } => handlers::digest::handle(
            &paths,
            &hours,
            max_tokens,
            summarize,
            output,
            cache_ttl,
            cli.format,
        ),
        Commands::Audit {
            hours,
            digest_hours,
            output,
        } => handlers::audit::handle(&paths, hours, digest_hours, output, cli.format),
        Commands::Threads { command } => handlers::threads::handle(&paths, command, cli.format),
        Commands::Wake { command } => handlers::wake::handle(&paths, command, cli.format),
        Commands::Triggers { command } => handlers::triggers::handle(&paths, command, cli.format),
        Commands::Senses { command } => handlers::senses::handle(&paths, command, cli.format),
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Diagnostics go to stderr so --format json stdout stays parseable.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
