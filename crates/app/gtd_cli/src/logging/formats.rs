use std::io::Write;

use flexi_logger::DeferredNow;
use log::Record;

/// `LEVEL message`, without timestamps or module paths.
pub fn cli_format(
    w: &mut dyn Write,
    _now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    write!(w, "{:<5} {}", record.level(), record.args())
}
