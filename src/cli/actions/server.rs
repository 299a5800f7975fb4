use crate::{
    auth::{AuthConfig, SameSite, ServerSecret},
    email::{LogMailer, Mailer},
    warden::{self, security::AllowedHosts},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub secret: SecretString,
    pub session_ttl_seconds: u32,
    pub reset_ttl_seconds: u32,
    pub pbkdf2_iterations: u32,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub allowed_hosts: Vec<String>,
    pub debug: bool,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new()
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_reset_ttl_seconds(self.reset_ttl_seconds)
            .with_pbkdf2_iterations(self.pbkdf2_iterations)
            .with_cookie_secure(self.cookie_secure)
            .with_cookie_same_site(self.cookie_same_site)
    }

    /// Only the log mailer exists, and it is for development.
    fn mailer(&self) -> Option<Arc<dyn Mailer>> {
        self.debug.then(|| Arc::new(LogMailer) as Arc<dyn Mailer>)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server secret is unusable, the database cannot be
/// reached, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let mailer = args
        .mailer()
        .context("No mail delivery configured for password reset codes; use --debug to log them")?;
    if args.debug {
        warn!("Debug mode: password reset codes are written to the log");
    }

    let secret = ServerSecret::from_base64(&args.secret).context("Invalid server secret")?;
    let config = args.auth_config();
    let allowed_hosts = AllowedHosts::new(args.allowed_hosts);

    let result = warden::new(args.port, args.dsn, secret, config, allowed_hosts, mailer).await;
    crate::cli::telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none (in-memory store)".to_string(), redact_dsn),
        ),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("reset_ttl_seconds", args.reset_ttl_seconds.to_string()),
        ("pbkdf2_iterations", args.pbkdf2_iterations.to_string()),
        ("cookie_secure", args.cookie_secure.to_string()),
        ("cookie_same_site", args.cookie_same_site.to_string()),
        ("allowed_hosts", args.allowed_hosts.join(",")),
        ("debug", args.debug.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(warden::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
