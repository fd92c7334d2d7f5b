//! Log subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the verbosity flags
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global subscriber writing to stderr
///
/// stdout carries only the verdict, so logs never go there.
pub fn init_logging(verbosity: Verbosity, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("warning: logging not initialised: {e}");
    }
}
