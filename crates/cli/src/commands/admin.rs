//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! lw-cli admin create -e admin@example.com -n "Admin Name" -r super_admin -p '<password>'
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use loomwear_admin::db;
use loomwear_admin::services::{AdminAuthError, AdminAuthService};
use loomwear_core::{AdminRole, AdminUserId};
use thiserror::Error;

use super::{MissingEnvVar, database_url};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

fn parse_role(role: &str) -> Result<AdminRole, AdminError> {
    role.parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))
}

/// Create a new admin user with an argon2-hashed password.
///
/// # Errors
///
/// Returns an error for an unknown role, an invalid email, a weak password,
/// an email that is already taken, or a database failure.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: &str,
) -> Result<AdminUserId, AdminError> {
    // Validate before connecting
    let role = parse_role(role)?;
    loomwear_admin::services::auth::validate_password(password)?;

    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let admin = AdminAuthService::new(&pool)
        .create_admin(email, name, role, password)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );

    Ok(admin.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse() {
        assert!(matches!(parse_role("viewer"), Ok(AdminRole::Viewer)));
        assert!(matches!(parse_role("owner"), Err(AdminError::InvalidRole(_))));
    }
}
