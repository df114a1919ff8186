use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "gtd", about = "GTD kit auth client", version)]
pub struct Cli {
    /// Auth service URL. Repeat or comma-separate for several instances.
    #[arg(
        long = "auth-url",
        env = "GTD_AUTH_URL",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:8081",
        global = true
    )]
    pub auth_url: Vec<Url>,

    /// Attempts per call across instances.
    #[arg(long, default_value_t = 3, global = true)]
    pub retry_max: u32,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, default_value_t = 500, global = true)]
    pub timeout_ms: u64,

    /// Log retries and transport detail. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,
    /// Log in and print the token pair.
    Login { username: String, password: String },
    /// Revoke the pair behind an access token.
    Logout { access_token: String },
    /// Exchange a refresh token for a new pair.
    Refresh { refresh_token: String },
    /// Check whether an access token id is active.
    Validate { access_uuid: String },
}
