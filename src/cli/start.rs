use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;
use tracing::Level;

/// Start the CLI
/// # Errors
/// Returns an error if logging cannot be initialised or the arguments are inconsistent
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_one::<u8>("verbosity").map_or(0, |&v| v);
    telemetry::init(Some(log_level(verbosity, matches.get_flag("debug"))))?;

    let action = handler(&matches)?;

    Ok(action)
}

/// Debug mode delivers reset codes through the log, so it needs at least `info`.
fn log_level(verbosity: u8, debug: bool) -> Level {
    let verbosity = if debug { verbosity.max(2) } else { verbosity };
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
