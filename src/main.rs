use std::sync::Arc;

use plenaria::{config, db, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plenaria=info".into()),
        )
        .init();

    let config = Arc::new(config::Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let conf = state::Conference::load(pool, config).await?;
    tracing::info!(
        topics = conf.topics.len(),
        options = conf.options.len(),
        decisions = conf.decisions.len(),
        "conference loaded"
    );

    Ok(())
}
