use clap::Parser;
use ghostvault::cli::{Cli, Commands};
use ghostvault::config::CoreConfig;
use ghostvault::errors::Result;

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // `check-config` reports a bad config itself; everything else refuses
    // to run without a valid one.
    let result = match cli.command {
        Commands::CheckConfig => ghostvault::cli::commands::check_config::execute(&cli),
        _ => ghostvault::cli::load_config(&cli).and_then(|config| dispatch(&cli, &config)),
    };

    if let Err(e) = result {
        ghostvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn dispatch(cli: &Cli, config: &CoreConfig) -> Result<()> {
    match cli.command {
        Commands::Shred {
            ref paths,
            recursive,
        } => ghostvault::cli::commands::shred::execute(config, paths, recursive),
        Commands::WipeFreeSpace { ref dir, max_bytes } => {
            ghostvault::cli::commands::wipe_free::execute(config, dir, max_bytes)
        }
        Commands::Status => ghostvault::cli::commands::status::execute(cli, config),
        Commands::Migrate => ghostvault::cli::commands::migrate::execute(cli, config),
        Commands::CheckConfig => ghostvault::cli::commands::check_config::execute(cli),
    }
}
