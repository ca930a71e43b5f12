//! `nebula` - browse database metadata trees from the terminal
//!
//! Loads connection profiles and template overrides per `settings.toml`,
//! then runs one tree operation and prints the result.

mod logging;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use nebula_connection::PoolManager;
use nebula_core::{InMemoryProfileStore, NebulaError, ProfileStore};
use nebula_drivers::DriverRegistry;
use nebula_tree::{Context, LegacyRow, TemplateRegistry, TreeNode, TreeService};

use settings::NebulaSettings;

/// Nebula - multi-dialect database metadata browser
#[derive(Parser)]
#[command(name = "nebula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to settings.toml
    #[arg(short, long, global = true, env = "NEBULA_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored connections
    Connections,

    /// List the children of a tree node
    Tree {
        connection_id: String,

        /// Node key, e.g. `database=sales/schema=public`; empty for the root
        #[arg(default_value = "")]
        key: String,
    },

    /// Run one named resolver against a node key
    Expand {
        connection_id: String,

        resolver: String,

        #[arg(default_value = "")]
        key: String,
    },

    /// List objects through the fixed introspection queries
    Legacy {
        connection_id: String,

        /// database, schema, table, column, view, login_role, ...
        node_type: String,

        /// `database/schema/table`, as deep as the node type needs
        #[arg(default_value = "")]
        path: String,
    },

    /// Test connectivity for a stored connection
    Test {
        connection_id: String,

        /// Try this password instead of the stored one
        #[arg(long, env = "NEBULA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show loaded templates
    Templates,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match NebulaSettings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(&settings.logging_config(cli.verbose)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: NebulaSettings) -> Result<()> {
    let profiles = Arc::new(load_profiles(settings.profiles_path().as_deref())?);
    let templates = TemplateRegistry::load(settings.template_dir().as_deref())
        .context("Failed to load tree templates")?;
    let pools = PoolManager::new(profiles.clone(), DriverRegistry::with_defaults())
        .with_max_pool_size(settings.pool.max_size);
    let service = TreeService::new(Arc::new(templates), Arc::new(pools));

    let result = dispatch(&cli, &service, profiles.as_ref()).await;
    service.shutdown().await;
    result
}

async fn dispatch(cli: &Cli, service: &TreeService, profiles: &InMemoryProfileStore) -> Result<()> {
    match &cli.command {
        Commands::Connections => {
            let connections = profiles.all_for_parent(None).await?;
            let mut table = new_table(&["Id", "Name", "Type", "Host", "Database"]);
            for profile in &connections {
                table.add_row(vec![
                    profile.id.clone(),
                    profile.name.clone(),
                    profile.dialect.display_name().to_string(),
                    format!("{}:{}", profile.host, profile.effective_port()),
                    profile.database.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        Commands::Tree { connection_id, key } => {
            let nodes = service.list_children(connection_id, key).await?;
            print_nodes(&nodes, cli.json)?;
        }
        Commands::Expand {
            connection_id,
            resolver,
            key,
        } => {
            let nodes = service
                .expand(connection_id, &Context::parse(key), resolver)
                .await?;
            print_nodes(&nodes, cli.json)?;
        }
        Commands::Legacy {
            connection_id,
            node_type,
            path,
        } => {
            let rows = service
                .list_legacy_children(connection_id, node_type, path)
                .await?;
            print_legacy_rows(&rows, cli.json)?;
        }
        Commands::Test {
            connection_id,
            password,
        } => {
            let mut profile = profiles
                .find_by_id(connection_id)
                .await?
                .ok_or_else(|| NebulaError::ConnectionNotFound(connection_id.clone()))?;
            // None lets the service fall back to the stored password
            profile.password = password.clone();
            let message = service.test_connection(profile).await?;
            println!("{message}");
        }
        Commands::Templates => {
            let mut table = new_table(&["Dialect", "Resolvers", "Root entries"]);
            for dialect in service.templates().dialects() {
                if let Some(template) = service.templates().template_for(dialect) {
                    table.add_row(vec![
                        dialect.display_name().to_string(),
                        template.resolvers.len().to_string(),
                        template.root.len().to_string(),
                    ]);
                }
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn load_profiles(path: Option<&Path>) -> Result<InMemoryProfileStore> {
    let Some(path) = path.filter(|p| p.exists()) else {
        tracing::warn!(path = ?path, "no profiles file, starting with no connections");
        return Ok(InMemoryProfileStore::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profiles from {:?}", path))?;
    let store = InMemoryProfileStore::from_json(&content)
        .with_context(|| format!("Failed to parse profiles {:?}", path))?;
    tracing::debug!(count = store.len(), path = %path.display(), "loaded connection profiles");
    Ok(store)
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn print_nodes(nodes: &[TreeNode], json: bool) -> Result<()> {
    if json {
        let values: Vec<_> = nodes.iter().map(TreeNode::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let mut table = new_table(&["Key", "Type", "Label", "Children"]);
    for node in nodes {
        let children = match (node.has_children, node.is_virtual) {
            (true, true) => "yes (group)",
            (true, false) => "yes",
            (false, _) => "",
        };
        table.add_row(vec![
            node.key.clone(),
            node.node_type.clone(),
            node.label.clone(),
            children.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn print_legacy_rows(rows: &[LegacyRow], json: bool) -> Result<()> {
    if json {
        let values: Vec<_> = rows.iter().map(LegacyRow::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let mut table = new_table(&["Id", "Name"]);
    for row in rows {
        table.add_row(vec![row.id.clone(), row.name.clone()]);
    }
    println!("{table}");
    Ok(())
}
