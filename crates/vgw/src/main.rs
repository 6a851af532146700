//! vgw: VPN provider server list updater
//!
//! Main entry point. Initializes the global allocator, sets up logging,
//! and dispatches the subcommand.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vgw_servers::{Provider, UpdaterConfig};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[clap(
    name = "vgw",
    about = "Builds VPN provider server catalogs from published OpenVPN profiles",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Configuration file (TOML, or JSON with a .json extension)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one update cycle
    Update {
        /// Provider to update (repeatable; default: all configured)
        #[clap(short, long = "provider")]
        providers: Vec<Provider>,

        /// Log the warnings found while updating
        #[clap(long)]
        print_warnings: bool,

        /// Print the listing of every updated catalog to stdout
        #[clap(long)]
        stdout: bool,

        /// Catalog snapshot file to load and write back
        #[clap(long)]
        catalog: Option<PathBuf>,
    },

    /// Update periodically until interrupted
    Run {
        /// Catalog snapshot file written after every cycle
        #[clap(long)]
        catalog: Option<PathBuf>,
    },

    /// Print stored catalogs as listings
    Show {
        /// Catalog snapshot file
        #[clap(long)]
        catalog: PathBuf,

        /// Provider to show (repeatable; default: all stored)
        #[clap(short, long = "provider")]
        providers: Vec<Provider>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so stdout only carries listings
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<UpdaterConfig> {
    match path {
        Some(path) => UpdaterConfig::from_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display())),
        None => Ok(UpdaterConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Update {
            providers,
            print_warnings,
            stdout,
            catalog,
        } => {
            if !providers.is_empty() {
                config.providers = providers;
            }
            config.print_warnings |= print_warnings;
            config.print_listing |= stdout;
            if catalog.is_some() {
                config.catalog_path = catalog;
            }
            commands::update(&config).await
        }
        Command::Run { catalog } => {
            if catalog.is_some() {
                config.catalog_path = catalog;
            }
            commands::run(&config).await
        }
        Command::Show { catalog, providers } => commands::show(&catalog, &providers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_flags() {
        let cli = Cli::try_parse_from([
            "vgw", "update", "-p", "privado", "--provider", "purevpn", "--stdout", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Update {
                providers, stdout, print_warnings, catalog,
            } => {
                assert_eq!(providers, vec![Provider::Privado, Provider::PureVpn]);
                assert!(stdout);
                assert!(!print_warnings);
                assert!(catalog.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["vgw", "update", "-p", "acme"]).is_err());
    }

    #[test]
    fn test_show_requires_catalog() {
        assert!(Cli::try_parse_from(["vgw", "show"]).is_err());
    }

    #[test]
    fn test_load_config_default_without_path() {
        assert_eq!(load_config(None).unwrap(), UpdaterConfig::default());
    }

    #[test]
    fn test_show_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        let listing = "# provider: surfshark\n# timestamp: 1700000000\nus-nyc.prod.surfshark.com 10.0.0.1\n";
        vgw_servers::CatalogStore::from_listings(&[listing])
            .unwrap()
            .save_file(&path)
            .unwrap();

        assert!(commands::show(&path, &[Provider::Surfshark]).is_ok());
        assert!(commands::show(&dir.path().join("missing.json"), &[]).is_err());
    }
}
