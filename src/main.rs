use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use roost::accounts::{NewUser, TokenOptions};
use roost::config::{EngineConfig, ServerConfig};
use roost::engine::{Engine, NewPlan};
use roost::server::{AppState, create_router};
use roost::store::{SqliteStore, Store};

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "roost")]
#[command(about = "Identity, group, and resource authorization server", long_about = None)]
struct Cli {
    /// Data directory holding the database
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// TOML file with engine settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database
    Init,

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage per-user group limits
    Limit {
        #[command(subcommand)]
        command: LimitCommands,
    },

    /// Manage subscription plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Record subscription facts for a group
    Subscription {
        #[command(subcommand)]
        command: SubscriptionCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user and print a fresh token for it
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Application the user belongs to
        #[arg(long)]
        application_id: Option<Uuid>,
        #[arg(long)]
        autogenerated: bool,
    },
}

#[derive(Subcommand)]
enum LimitCommands {
    /// Set how many groups a user may own
    Set {
        #[arg(long)]
        username: String,
        #[arg(long)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Add a plan to the catalog
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        plan_type: String,
        #[arg(long, default_value = "0")]
        default_units: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        public: bool,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommands {
    /// Create or update a group's subscription to a plan
    Set {
        #[arg(long)]
        group_id: Uuid,
        #[arg(long)]
        plan_id: Uuid,
        #[arg(long)]
        units: i64,
        /// Record the subscription as inactive
        #[arg(long)]
        inactive: bool,
    },
}

fn load_engine_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_engine(config: &ServerConfig) -> anyhow::Result<Engine<SqliteStore>> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("Database not found at {}. Run 'roost init' first.", db_path.display());
    }

    let engine_config = load_engine_config(config.engine_config.as_ref())?;
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    Ok(Engine::new(Arc::new(store), engine_config))
}

fn run_init(config: &ServerConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    let existed = db_path.exists();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    #[cfg(unix)]
    set_restrictive_permissions(&db_path);

    if existed {
        println!("Database already initialized at {}", db_path.display());
    } else {
        println!("Initialized database at {}", db_path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roost=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig {
        data_dir: cli.data_dir,
        engine_config: cli.config,
        ..ServerConfig::default()
    };

    match cli.command {
        Commands::Init => run_init(&config)?,
        Commands::Serve { host, port } => {
            config.host = host;
            config.port = port;

            let engine = open_engine(&config)?;
            let state = Arc::new(AppState { engine });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::User { command } => match command {
            UserCommands::Create {
                username,
                email,
                password,
                application_id,
                autogenerated,
            } => {
                let engine = open_engine(&config)?;
                let user = engine.create_user(NewUser {
                    username,
                    email,
                    password: password.clone(),
                    application_id,
                    first_name: None,
                    last_name: None,
                    autogenerated,
                    verified: false,
                })?;
                let token = engine.login(
                    &user.username,
                    &password,
                    application_id,
                    TokenOptions::default(),
                )?;

                println!("Created user '{}' ({})", user.username, user.id);
                println!("Token: {}", token.id);
            }
        },
        Commands::Limit { command } => match command {
            LimitCommands::Set { username, limit } => {
                let engine = open_engine(&config)?;
                let username = username.to_lowercase();
                let user = engine
                    .store()
                    .read(|s| s.get_user_by_username(&username, None))?
                    .with_context(|| format!("user '{username}' not found"))?;
                engine.set_user_group_limit(user.id, limit)?;

                println!("Group limit for '{}' set to {limit}", user.username);
            }
        },
        Commands::Plan { command } => match command {
            PlanCommands::Create {
                name,
                plan_type,
                default_units,
                description,
                public,
            } => {
                let engine = open_engine(&config)?;
                let plan = engine.create_subscription_plan(NewPlan {
                    name,
                    description,
                    plan_type,
                    default_units,
                    public,
                })?;

                println!("Created plan '{}' ({})", plan.name, plan.id);
            }
        },
        Commands::Subscription { command } => match command {
            SubscriptionCommands::Set {
                group_id,
                plan_id,
                units,
                inactive,
            } => {
                let engine = open_engine(&config)?;
                let subscription = engine.set_subscription(group_id, plan_id, units, !inactive)?;

                println!(
                    "Subscription of group {} to plan {} set: {} units, {}",
                    subscription.group_id,
                    subscription.subscription_plan_id,
                    subscription.units,
                    if subscription.active { "active" } else { "inactive" }
                );
            }
        },
    }

    Ok(())
}
