//! Storage failure classification
//!
//! Maps a [`StoreError`] onto the domain taxonomy. `NotFound` and
//! `Unauthorized` are never inferred here; callers raise them explicitly.
//! Uniqueness violations that a resolver expects (find-or-create races) are
//! matched by the resolver before they reach this function.

use crate::error::Error;
use crate::store::StoreError;

pub fn classify(err: StoreError) -> Error {
    match err {
        StoreError::UniqueViolation { .. } => Error::conflict("resource already exists"),
        StoreError::ForeignKeyViolation { .. } => {
            Error::validation("invalid relationship reference")
        }
        other => Error::Store(other),
    }
}
