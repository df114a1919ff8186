//! `gtd`: command-line client for the GTD kit auth service.

pub use self::error::{Error, Result};
mod error;

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands};
use gtd_core::context::RequestContext;
use gtd_core::models::wire::{LogoutResponse, TokensResponse, ValidateResponse};
use gtd_proxy::remote::TokenValidator;
use gtd_proxy::remote::http::{HttpAuthClient, RemoteEndpoint, RetryPolicy};
use serde::Serialize;

mod cli;
mod logging;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let _logger = match logging::init(args.verbose) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn auth_client(args: &Cli) -> Result<HttpAuthClient> {
    let policy = RetryPolicy {
        max_attempts: args.retry_max,
        attempt_timeout: Duration::from_millis(args.timeout_ms),
        ..RetryPolicy::default()
    };
    let endpoint = RemoteEndpoint::new(args.auth_url.clone(), policy)?;
    log::debug!("auth service instances: {:?}", endpoint.instances());
    Ok(HttpAuthClient::new(endpoint))
}

async fn run(args: Cli) -> Result<()> {
    let ctx = RequestContext::new();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Login { username, password } => {
            let tokens = auth_client(&args)?.login(&ctx, username, password).await?;
            print_json(&TokensResponse { tokens })?;
        }
        Commands::Logout { access_token } => {
            let success = auth_client(&args)?.logout(&ctx, access_token).await?;
            print_json(&LogoutResponse { success })?;
        }
        Commands::Refresh { refresh_token } => {
            let tokens = auth_client(&args)?.refresh(&ctx, refresh_token).await?;
            print_json(&TokensResponse { tokens })?;
        }
        Commands::Validate { access_uuid } => {
            let valid = auth_client(&args)?.validate(&ctx, access_uuid).await?;
            print_json(&ValidateResponse { valid })?;
        }
    }

    Ok(())
}
