//! Startup tasks that run once the store is ready

use clinics_core::store::{Store, User};
use clinics_core::{Registry, Result};

use crate::config::Config;

/// Ensure the configured bootstrap login user exists.
///
/// Returns `None` when no bootstrap user is configured. An existing user
/// keeps its password.
pub async fn ensure_bootstrap_user<S: Store>(
    registry: &Registry<S>,
    config: &Config,
) -> Result<Option<User>> {
    let Some((email, password_hash)) = config.bootstrap_user() else {
        return Ok(None);
    };
    let user = registry.ensure_user(email, password_hash).await?;
    tracing::info!(user_id = %user.id, "bootstrap user ready");
    Ok(Some(user))
}
