//! Command-line entry point for the AssetDesk permission service

use anyhow::{Context, Result, bail};
use assetdesk_authz::{PermissionSet, Role, RoleOverride};
use assetdesk_server::{LogFormat, ServerConfig, api, state::AppState};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "assetdesk-server")]
#[command(about = "AssetDesk role and permission service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ASSETDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Override the log filter (e.g. "debug", "assetdesk_authz=trace")
    #[arg(long)]
    log_level: Option<String>,

    /// Override the log format (json, pretty, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,

    /// Print the effective capability matrix for a role
    Resolve {
        /// Role name
        role: String,

        /// JSON file with custom permission entries to layer on top
        #[arg(long)]
        custom: Option<PathBuf>,
    },

    /// Manage persisted role permissions
    Roles {
        #[command(subcommand)]
        action: RoleCommands,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// Show a role's default permissions and where they come from
    Show { role: String },

    /// Replace a role's permissions from a JSON file
    Set {
        role: String,
        /// JSON array of permission entries
        file: PathBuf,
    },

    /// Drop a role's persisted permissions, restoring the built-in defaults
    Reset { role: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            process::exit(1);
        }
    };

    if let Err(e) = config.logging.initialize() {
        eprintln!("{e}");
        process::exit(1);
    }

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Resolve { role, custom } => resolve(&config, &role, custom.as_deref()).await,
        Commands::Roles { action } => handle_role_command(&config, action).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    Ok(config)
}

async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("AssetDesk permission service listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn read_permission_set(path: &Path) -> Result<PermissionSet> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let set = serde_json::from_str(&contents)
        .with_context(|| format!("parsing permission entries in {}", path.display()))?;
    Ok(set)
}

async fn resolve(config: &ServerConfig, role: &str, custom: Option<&Path>) -> Result<()> {
    let gate = config.authz.build_gate();
    let role = Role::from(role);
    let custom = custom.map(read_permission_set).transpose()?;

    let matrix = if role == gate.config().superuser_role {
        assetdesk_authz::CapabilityMatrix::full()
    } else {
        gate.resolver()
            .resolve(&role, custom.is_some(), custom.as_ref())
            .await?
    };
    println!("{}", serde_json::to_string_pretty(&matrix)?);
    Ok(())
}

async fn handle_role_command(config: &ServerConfig, action: RoleCommands) -> Result<()> {
    let gate = config.authz.build_gate();
    let resolver = gate.resolver();

    match action {
        RoleCommands::Show { role } => {
            let role = Role::from(role);
            let (permissions, source) = resolver.role_defaults(&role).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "role": role,
                    "description": role.description(),
                    "source": source,
                    "permissions": permissions,
                }))?
            );
        }
        RoleCommands::Set { role, file } => {
            let role = Role::from(role);
            if role == gate.config().superuser_role {
                bail!("role '{}' bypasses permission checks and has no editable permissions", role);
            }
            let Some(store) = resolver.store() else {
                bail!("no permission store is configured");
            };
            let permissions = read_permission_set(&file)?;
            let entries = permissions.len();
            store
                .save_role_override(RoleOverride::new(role.clone(), permissions, None))
                .await?;
            println!("Saved {entries} permission entries for role '{role}'");
        }
        RoleCommands::Reset { role } => {
            let role = Role::from(role);
            let Some(store) = resolver.store() else {
                bail!("no permission store is configured");
            };
            if store.delete_role_override(&role).await? {
                println!("Role '{role}' reset to built-in defaults");
            } else {
                println!("Role '{role}' has no persisted permissions");
            }
        }
    }
    Ok(())
}
