use gtd_core::auth::AuthError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Failures of a `gtd` invocation. Each one ends the process with exit code 1.
#[derive(Error, Debug)]
pub enum Error {
    /// The auth service rejected the call or could not be reached.
    #[error("{}: {}", .0.code(), .0)]
    Auth(#[from] AuthError),

    #[error("writing output: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("logger setup: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_lead_with_their_wire_code() {
        let err = Error::from(AuthError::KeyNotFound);
        assert!(err.to_string().starts_with("key_not_found: "));
    }
}
