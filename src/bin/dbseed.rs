use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::{
    db,
    repositories::user::{PgUserRepository, UserStore},
    Config,
};

/// Inserts a few sample users into the configured database.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to seed the database")?;

    let pool = db::create_pool(database_url)?;
    db::ensure_schema(&pool).await?;
    tracing::info!("✅ Database schema ready");

    let store = UserStore::Postgres(PgUserRepository::new(pool));
    let users = store.seed().await?;
    for user in &users {
        tracing::info!("🌱 Seeded user {} ({})", user.id, user.name);
    }
    tracing::info!("✅ Seeded {} users", users.len());
    Ok(())
}
