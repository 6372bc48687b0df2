//! agencyctl — operator CLI for the agency.
//!
//! # Usage
//!
//! ```text
//! agencyctl --store /var/lib/agency/agency.redb servers --scope plan
//! agencyctl add-secondary SCND-1 PRMR-1
//! agencyctl move-shard _system users s12 PRMR-2
//! ```

use std::path::PathBuf;

use agency_core::AgencyConfig;
use agency_facade::{Agency, Scope};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(
    name = "agencyctl",
    about = "Inspect and administer cluster topology in the agency",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to agency.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// redb store file (overrides [store].path).
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    Target,
    Plan,
    Current,
}

impl From<ScopeArg> for Scope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Target => Scope::Target,
            ScopeArg::Plan => Scope::Plan,
            ScopeArg::Current => Scope::Current,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read a raw path.
    Get {
        path: String,
        /// Only the immediate level.
        #[arg(long)]
        shallow: bool,
    },
    /// Write a raw value. Parsed as JSON, or stored as a string.
    Set {
        path: String,
        value: String,
        /// Expire the key after this many seconds.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete a raw path.
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print the bound route tree.
    Routes {
        /// Also bind one route per Target collection.
        #[arg(long)]
        collections: bool,
    },
    /// List DBServers with their roles.
    Servers {
        #[arg(long, value_enum, default_value_t = ScopeArg::Target)]
        scope: ScopeArg,
    },
    /// List coordinators.
    Coordinators {
        #[arg(long, value_enum, default_value_t = ScopeArg::Target)]
        scope: ScopeArg,
    },
    /// Register an unpaired primary.
    AddPrimary { id: String },
    /// Pair a secondary with an existing primary.
    AddSecondary { id: String, primary: String },
    /// Write a primary/secondary pairing.
    AddPair { primary: String, secondary: String },
    /// Register a coordinator.
    AddCoordinator { id: String },
    /// Remove a DBServer or coordinator.
    RemoveServer { id: String },
    /// List databases.
    Databases {
        #[arg(long, value_enum, default_value_t = ScopeArg::Target)]
        scope: ScopeArg,
    },
    /// List the collections of a database.
    Collections {
        database: String,
        #[arg(long, value_enum, default_value_t = ScopeArg::Target)]
        scope: ScopeArg,
    },
    /// Show a collection's shard map.
    Shards {
        database: String,
        collection: String,
        /// Only shards this server holds.
        #[arg(long)]
        server: Option<String>,
        #[arg(long, value_enum, default_value_t = ScopeArg::Target)]
        scope: ScopeArg,
    },
    /// Make a server the leader of a Target shard.
    MoveShard {
        database: String,
        collection: String,
        shard: String,
        to: String,
    },
    /// Check distributeShardsLike layouts of a database.
    Colocation {
        database: String,
        #[arg(long, value_enum, default_value_t = ScopeArg::Plan)]
        scope: ScopeArg,
    },
    /// Leaders and followers of every shard in a database.
    Distribution {
        database: String,
        #[arg(long, value_enum, default_value_t = ScopeArg::Plan)]
        scope: ScopeArg,
    },
    /// Heartbeat status and staleness of every server.
    Health,
    /// Supervision job queues.
    Supervision,
}

fn load_config(cli: &Cli) -> anyhow::Result<AgencyConfig> {
    let mut config = match &cli.config {
        Some(path) => AgencyConfig::from_file(path)?,
        None => AgencyConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store.path = Some(store.clone());
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(store = ?config.store.path, prefix = %config.store.prefix, "opening agency");
    let mut agency = Agency::open(&config)?;
    let format = cli.format;

    match cli.command {
        Commands::Get { path, shallow } => commands::kv::get(&agency, &path, !shallow),
        Commands::Set { path, value, ttl } => commands::kv::set(&agency, &path, &value, ttl),
        Commands::Rm { path, recursive } => commands::kv::rm(&agency, &path, recursive),
        Commands::Routes { collections } => commands::kv::routes(&agency, collections, format),

        Commands::Servers { scope } => commands::membership::servers(&agency, scope.into(), format),
        Commands::Coordinators { scope } => {
            commands::membership::coordinators(&agency, scope.into(), format)
        }
        Commands::AddPrimary { id } => {
            agency.add_primary(&id)?;
            println!("✓ {id} added as primary");
            Ok(())
        }
        Commands::AddSecondary { id, primary } => {
            agency.add_secondary(&id, &primary)?;
            println!("✓ {id} paired as secondary of {primary}");
            Ok(())
        }
        Commands::AddPair { primary, secondary } => {
            agency.add_pair(&primary, &secondary)?;
            println!("✓ {primary} paired with {secondary}");
            Ok(())
        }
        Commands::AddCoordinator { id } => {
            agency.add_coordinator(&id)?;
            println!("✓ {id} added as coordinator");
            Ok(())
        }
        Commands::RemoveServer { id } => commands::membership::remove_server(&mut agency, &id, format),

        Commands::Databases { scope } => commands::topology::databases(&agency, scope.into(), format),
        Commands::Collections { database, scope } => {
            commands::topology::collections(&agency, scope.into(), &database, format)
        }
        Commands::Shards {
            database,
            collection,
            server,
            scope,
        } => commands::topology::shards(
            &agency,
            scope.into(),
            &database,
            &collection,
            server.as_deref(),
            format,
        ),
        Commands::MoveShard {
            database,
            collection,
            shard,
            to,
        } => commands::topology::move_shard(&agency, &database, &collection, &shard, &to, format),
        Commands::Colocation { database, scope } => {
            commands::topology::colocation(&agency, scope.into(), &database, format)
        }
        Commands::Distribution { database, scope } => {
            commands::topology::distribution(&agency, scope.into(), &database, format)
        }

        Commands::Health => commands::health::health(&mut agency, format),
        Commands::Supervision => commands::health::supervision(&agency, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn store_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("agency.toml");
        std::fs::write(
            &config_path,
            "[store]\npath = \"/tmp/a.redb\"\nprefix = \"cluster-a\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "agencyctl",
            "--config",
            config_path.to_str().unwrap(),
            "--store",
            "/tmp/b.redb",
            "servers",
            "--scope",
            "plan",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/b.redb")));
        assert_eq!(config.store.prefix, "cluster-a");
        assert!(matches!(
            cli.command,
            Commands::Servers {
                scope: ScopeArg::Plan
            }
        ));
    }
}
