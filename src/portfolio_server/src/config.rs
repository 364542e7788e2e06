use std::{path::PathBuf, time::Duration};

use secrecy::SecretString;
use shared_utils::env::{EnvError, get_env_opt, get_env_parsed_or, get_env_var};
use tracing::{info, warn};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default allowed clock skew for webhook signatures.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Server settings, read once at startup.
#[derive(Debug)]
pub struct Config {
    /// SQLite path or `sqlite://` URL.
    pub database_url: String,
    /// Listen port.
    pub port: u16,
    /// Plan catalog TOML; the built-in catalog is used when unset.
    pub plans_file: Option<PathBuf>,
    /// Shared secret for processor webhooks. The webhook route answers 503 without it.
    pub webhook_secret: Option<SecretString>,
    /// Maximum age of a signed webhook timestamp.
    pub webhook_tolerance: Duration,
}

impl Config {
    /// Read `DATABASE_URL`, `PORTFOLIO_PORT`, `PORTFOLIO_PLANS_FILE`,
    /// `PAYMENT_WEBHOOK_SECRET` and `PAYMENT_WEBHOOK_TOLERANCE_SECS`.
    pub fn load() -> Result<Self, EnvError> {
        let database_url = get_env_var("DATABASE_URL")?;
        let port = get_env_parsed_or("PORTFOLIO_PORT", DEFAULT_PORT)?;
        let plans_file = get_env_opt("PORTFOLIO_PLANS_FILE").map(PathBuf::from);
        let webhook_secret = get_env_opt("PAYMENT_WEBHOOK_SECRET").map(|s| SecretString::new(s.into()));
        let tolerance = get_env_parsed_or("PAYMENT_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS)?;

        if webhook_secret.is_none() {
            warn!("PAYMENT_WEBHOOK_SECRET not set, processor webhooks are disabled");
        }
        if plans_file.is_none() {
            info!("PORTFOLIO_PLANS_FILE not set, using built-in plan catalog");
        }

        Ok(Self {
            database_url,
            port,
            plans_file,
            webhook_secret,
            webhook_tolerance: Duration::from_secs(tolerance),
        })
    }

    /// Settings for an existing database with everything optional left off.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: DEFAULT_PORT,
            plans_file: None,
            webhook_secret: None,
            webhook_tolerance: Duration::from_secs(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        }
    }
}
