//! Logging setup: a thin `env_logger` initializer so the
//! CLI and library consumers share one place that decides the log format
//! and reads `RUST_LOG`/the `-v` flag.

use std::io::Write;

/// Initializes the global logger at `level` unless one is already set
/// (e.g. by a host application or a previous call in the same process).
pub fn init(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .try_init();
}

/// Maps the CLI's `-v`/`-vv`/`-vvv` repeat-count to a `log::LevelFilter`.
pub fn level_from_verbosity(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}
