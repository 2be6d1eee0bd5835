//! Clinic/dentist affiliations
//!
//! At most one active link exists per (clinic, dentist). Attaching an
//! already linked dentist edits the active link's roles; attaching after an
//! unlink starts a new link, so history is kept as separate rows.

use uuid::Uuid;

use crate::identity::{resolve_or_create_dentist, resolve_or_create_person, PersonDetails};
use crate::ids::{Clock, IdGenerator};
use crate::models::{RolePatch, TaxId};
use crate::store::{Affiliation, ClinicDentistRow, Queries};
use crate::{Error, Result};

const LINK_NOT_FOUND: &str = "clinic dentist active link not found";

/// Who is being attached
#[derive(Debug, Clone)]
pub struct DentistIdentity {
    pub tax_id: TaxId,
    pub details: PersonDetails,
}

/// Attach a dentist to a clinic, creating person and dentist as needed.
///
/// Returns the link and whether this call created it. A lost insert race
/// is resolved by applying `roles` to the winner's row, so `created` is
/// true only for a clean insert.
pub async fn attach_or_update<Q: Queries>(
    q: &mut Q,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    clinic_id: Uuid,
    dentist: &DentistIdentity,
    roles: RolePatch,
) -> Result<(ClinicDentistRow, bool)> {
    if q.find_clinic(clinic_id).await?.is_none() {
        return Err(Error::not_found("clinic not found"));
    }

    let person = resolve_or_create_person(q, ids, clock, &dentist.tax_id, &dentist.details).await?;
    let dentist = resolve_or_create_dentist(q, ids, clock, person.id).await?;
    let (affiliation, created) = link(q, ids, clock, clinic_id, dentist.id, roles).await?;

    Ok((
        ClinicDentistRow {
            dentist,
            person,
            affiliation,
        },
        created,
    ))
}

async fn link<Q: Queries>(
    q: &mut Q,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    clinic_id: Uuid,
    dentist_id: Uuid,
    roles: RolePatch,
) -> Result<(Affiliation, bool)> {
    if q.find_affiliation(clinic_id, dentist_id).await?.is_some() {
        let updated = apply_roles(q, clinic_id, dentist_id, roles).await?;
        return Ok((updated, false));
    }

    let affiliation = Affiliation {
        id: ids.next_id(),
        clinic_id,
        dentist_id,
        is_admin: roles.is_admin.unwrap_or(false),
        is_legal_representative: roles.is_legal_representative.unwrap_or(false),
        started_at: clock.now(),
        ended_at: None,
    };

    match q.insert_affiliation(&affiliation).await {
        Ok(()) => Ok((affiliation, true)),
        Err(e) if e.is_unique_violation() => {
            tracing::debug!(%clinic_id, %dentist_id, "link created concurrently, updating roles");
            let updated = apply_roles(q, clinic_id, dentist_id, roles).await?;
            Ok((updated, false))
        }
        Err(e) => Err(e.into()),
    }
}

async fn apply_roles<Q: Queries>(
    q: &mut Q,
    clinic_id: Uuid,
    dentist_id: Uuid,
    roles: RolePatch,
) -> Result<Affiliation> {
    q.update_affiliation_roles(clinic_id, dentist_id, roles)
        .await?
        .ok_or_else(|| Error::not_found(LINK_NOT_FOUND))
}

/// Change the role flags of an active link. At least one flag is required.
pub async fn update_roles<Q: Queries>(
    q: &mut Q,
    clinic_id: Uuid,
    dentist_id: Uuid,
    roles: RolePatch,
) -> Result<Affiliation> {
    if roles.is_empty() {
        return Err(Error::validation("at least one role field must be provided"));
    }
    apply_roles(q, clinic_id, dentist_id, roles).await
}

/// End the active link between a clinic and a dentist.
///
/// A dentist must keep at least one active clinic, so ending the last link
/// fails with `Conflict`.
///
/// No row lock covers the dentist's other links. Two concurrent calls
/// ending the same dentist's links at two different clinics can each count
/// the other link as still active and both succeed, leaving the dentist
/// with no active clinic. Callers that must rule this out serialise
/// unlinks per dentist.
pub async fn end<Q: Queries>(
    q: &mut Q,
    clinic_id: Uuid,
    dentist_id: Uuid,
    clock: &dyn Clock,
) -> Result<()> {
    if q.find_affiliation(clinic_id, dentist_id).await?.is_none() {
        return Err(Error::not_found(LINK_NOT_FOUND));
    }

    if q.count_dentist_affiliations(dentist_id).await? <= 1 {
        return Err(Error::conflict(
            "cannot unlink dentist from the last active clinic",
        ));
    }

    // Zero rows means another request ended it after the lookup.
    if q.end_affiliation(clinic_id, dentist_id, clock.now()).await? == 0 {
        return Err(Error::not_found(LINK_NOT_FOUND));
    }
    Ok(())
}
