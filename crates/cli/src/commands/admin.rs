//! User role management.

use super::CommandError;

/// Promote an existing user to a role.
///
/// # Errors
///
/// Returns an error for an unknown role or a missing user.
pub async fn promote(email: &str, role: &str) -> Result<(), CommandError> {
    if !matches!(role, "customer" | "staff" | "admin") {
        return Err(CommandError::Invalid(format!(
            "unknown role '{role}' (expected customer, staff, or admin)"
        )));
    }

    let pool = super::connect().await?;

    let result = sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE email = $1")
        .bind(email)
        .bind(role)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CommandError::Invalid(format!("no user with email {email}")));
    }

    tracing::info!(email, role, "role updated");
    Ok(())
}
