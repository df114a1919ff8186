//! GTD kit service binary.
//!
//! Runs one of the auth, user or task services, or the gateway in front of
//! them. Configuration comes from the
//! environment (and `.env`), see `gtd_api::config::ApiConfig`.

mod services;

use clap::{Parser, Subcommand};
use gtd_api::config::ApiConfig;
use tracing::info;

/// CLI arguments for the service binary.
#[derive(Parser, Debug)]
#[command(name = "gtd_server", about = "GTD kit service", version)]
struct Args {
    /// Address to listen on; overrides BIND_ADDR.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand, Debug)]
enum Service {
    /// Token lifecycle service.
    Auth,
    /// User service.
    User {
        /// Account to create at startup, as NAME:PASSWORD. Repeatable.
        #[arg(long = "seed-user", value_name = "NAME:PASSWORD")]
        seed_user: Vec<String>,
    },
    /// Task service.
    Task,
    /// Public gateway relaying to the auth and task services.
    Gateway,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,gtd_api=debug,gtd_core=debug,gtd_proxy=debug",
                )
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let (name, app) = match &args.service {
        Service::Auth => ("auth", services::auth(&config).await?),
        Service::User { seed_user } => ("user", services::user(&config, seed_user).await?),
        Service::Task => ("task", services::task(&config).await?),
        Service::Gateway => ("gateway", services::gateway(&config)?),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(service = name, addr = %local_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(service = name, "stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
