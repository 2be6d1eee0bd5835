//! clinics-core: transactional domain core for the clinic registry
//!
//! Manages clinics, dentists and their time-bounded affiliations over a
//! relational store. The interesting parts live in:
//!
//! - [`identity`]: find-or-create of persons by normalized tax id
//! - [`affiliation`]: the single active clinic/dentist link
//! - [`guard`]: "every clinic keeps at least one bank account"
//! - [`pagination`]: forward cursor pagination over soft-deleted rows
//!
//! Every use case is reachable through [`Registry`].

pub mod affiliation;
pub mod classify;
pub mod error;
pub mod guard;
pub mod identity;
pub mod ids;
pub mod models;
pub mod pagination;
pub mod registry;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use ids::{Clock, FixedClock, IdGenerator, SystemClock, UuidV7Generator};
pub use pagination::{CursorPage, PageRequest};
pub use registry::Registry;
