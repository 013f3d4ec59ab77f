//! Database migration command.
//!
//! Applies the storefront schema from `crates/storefront/migrations/` and
//! creates the tower-sessions table.

use tower_sessions_sqlx_store::PostgresStore;

use super::CommandError;

/// Run all storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session store tables...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete");
    Ok(())
}
