use clap::{Parser, Subcommand};
use dashboard_security::admin::{self, AdminCommands};
use dashboard_security::config::Config;
use dashboard_security::error::AppResult;
use dashboard_security::server;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// dashboard-security - CORS, CSRF and Basic auth front for the dashboard
#[derive(Parser, Debug)]
#[command(name = "dashboard-security")]
#[command(version)]
#[command(about = "CORS, CSRF and HTTP Basic security front for the dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Server {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        admin_command: AdminCommands,
    },
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .init();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Server { host, port } => {
            // Override config with CLI args if provided
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let addr = config.server.bind_address();

            server::run_server(config, addr).await
        }
        Commands::Admin { admin_command } => admin::run(config, admin_command),
    }
}
