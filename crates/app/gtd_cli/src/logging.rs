pub mod formats;

use flexi_logger::{Logger, LoggerHandle};

use crate::Result;

/// Level used when `RUST_LOG` is unset.
fn default_spec(verbose: bool) -> &'static str {
    if verbose {
        "info,gtd_proxy=debug,gtd_core=debug"
    } else {
        "warn"
    }
}

/// Start logging to stderr; stdout is reserved for JSON results.
///
/// The handle must outlive the command so buffered lines are flushed.
pub fn init(verbose: bool) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(default_spec(verbose))?
        .format(formats::cli_format)
        .log_to_stderr()
        .start()?;
    Ok(handle)
}
