//! kiln - recipe-driven library packaging

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kiln_cli::cmd;
use kiln_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    match cli.command {
        Commands::Inspect { recipe } => cmd::inspect::inspect(&recipe),
        Commands::Check { recipe } => cmd::check::check(&recipe),
        Commands::Requires { recipe, options } => cmd::requires::requires(&recipe, &options),
        Commands::Config {
            recipe,
            options,
            settings,
        } => cmd::config::config(&recipe, &options, &settings),
        Commands::Build(args) => cmd::build::build(&args, verbose),
        Commands::Package(args) => cmd::package::package(&args),
        Commands::Verify {
            recipe,
            package_dir,
        } => cmd::verify::verify(&recipe, &package_dir),
    }
}
