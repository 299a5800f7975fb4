use crate::{
    auth::SameSite,
    cli::actions::{server::Args, Action},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();
    let secret = matches
        .get_one::<String>("secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --secret")?;

    let session_ttl_seconds = matches
        .get_one::<u32>("session-ttl-seconds")
        .copied()
        .context("missing argument: --session-ttl-seconds")?;
    let reset_ttl_seconds = matches
        .get_one::<u32>("reset-ttl-seconds")
        .copied()
        .context("missing argument: --reset-ttl-seconds")?;
    let pbkdf2_iterations = matches
        .get_one::<u32>("pbkdf2-iterations")
        .copied()
        .context("missing argument: --pbkdf2-iterations")?;

    let cookie_secure = matches.get_flag("cookie-secure");
    let debug = matches.get_flag("debug");
    let cookie_same_site = matches
        .get_one::<String>("cookie-same-site")
        .map_or(Ok(SameSite::Lax), |value| value.parse::<SameSite>())
        .map_err(|e| anyhow!(e))?;

    let allowed_hosts = matches
        .get_many::<String>("allowed-hosts")
        .map(|hosts| hosts.cloned().collect())
        .unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        dsn,
        secret,
        session_ttl_seconds,
        reset_ttl_seconds,
        pbkdf2_iterations,
        cookie_secure,
        cookie_same_site,
        allowed_hosts,
        debug,
    }))
}
