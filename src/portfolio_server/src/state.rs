use std::sync::Arc;

use anyhow::Context;
use diesel::SqliteConnection;
use portfolio::db::{connection::connect_sqlite, migrate};
use portfolio::plans::{
    DEFAULT_PLANS_TOML, PlanCache,
    config::{load_plans_path, load_plans_str},
    sync::{SyncOptions, sync_plans},
};
use portfolio::{PortfolioError, PortfolioResult};
use tokio::task::spawn_blocking;
use tracing::info;

use super::{config::Config, error::AppError};

pub struct State {
    pub config: Config,
    pub plans: PlanCache,
}

impl State {
    /// Migrate the database, sync the plan catalog into it and warm the plan cache.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let url = config.database_url.clone();
        let plans_file = config.plans_file.clone();

        let plans = spawn_blocking(move || -> anyhow::Result<PlanCache> {
            migrate::run_all(&url)?;
            let mut conn = connect_sqlite(&url)?;

            let catalog = match &plans_file {
                Some(path) => load_plans_path(path)?,
                None => load_plans_str(DEFAULT_PLANS_TOML)?,
            };
            let diff = sync_plans(&mut conn, &catalog, SyncOptions::default())?;
            info!(changed = diff.upsert.len(), "plan catalog in sync");

            let cache = PlanCache::new();
            cache.refresh(&mut conn)?;
            Ok(cache)
        })
        .await
        .context("startup task panicked")??;

        Ok(Arc::new(Self { config, plans }))
    }

    /// Run blocking Diesel work on its own connection off the async runtime.
    pub async fn db<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> PortfolioResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let url = self.config.database_url.clone();
        let out = spawn_blocking(move || {
            let mut conn = connect_sqlite(&url).map_err(PortfolioError::Internal)?;
            f(&mut conn)
        })
        .await
        .context("database task panicked")?;
        Ok(out?)
    }
}
