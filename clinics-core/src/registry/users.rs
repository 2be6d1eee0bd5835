//! Login users
//!
//! Only the storage side lives here. Password hashing and token issuance
//! belong to the auth layer, which hands over an already hashed password.

use tracing::instrument;

use super::Registry;
use crate::models::Email;
use crate::store::{Queries, Store, User};
use crate::{Error, Result};

impl<S: Store> Registry<S> {
    /// Find or create the user for `email`, compared case-insensitively.
    ///
    /// An existing user is returned untouched; its password is not changed.
    #[instrument(skip_all)]
    pub async fn ensure_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let email = Email::new(email)?.to_lowercase();
        if password_hash.trim().is_empty() {
            return Err(Error::validation("password_hash cannot be empty"));
        }

        let mut session = self.store.session().await?;
        if let Some(user) = session.find_user_by_email(&email).await? {
            return Ok(user);
        }

        let user = User {
            id: self.ids.next_id(),
            email,
            password_hash: password_hash.to_owned(),
            created_at: self.clock.now(),
        };
        match session.insert_user(&user).await {
            Ok(()) => Ok(user),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!("user created concurrently, re-reading");
                match session.find_user_by_email(&user.email).await? {
                    Some(user) => Ok(user),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by email, ignoring case.
    #[instrument(skip_all)]
    pub async fn find_user(&self, email: &str) -> Result<Option<User>> {
        let mut session = self.store.session().await?;
        Ok(session.find_user_by_email(&email.trim().to_lowercase()).await?)
    }
}
