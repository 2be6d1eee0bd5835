//! Dentist and affiliation use cases

use tracing::instrument;
use uuid::Uuid;

use super::Registry;
use crate::affiliation::{self, DentistIdentity};
use crate::identity::PersonDetails;
use crate::models::{
    text, AttachDentist, ClinicDentist, DentistSummary, Email, LegalName, PersonKind, RolePatch,
    TaxId, UpdateDentist,
};
use crate::pagination::{CursorPage, PageRequest};
use crate::store::{ClinicDentistRow, PersonPatch, Queries, Store, Transaction};
use crate::{Error, Result};

const DENTIST_NOT_FOUND: &str = "dentist not found";

impl<S: Store> Registry<S> {
    /// Attach a dentist to a clinic, or update the roles of the active link.
    ///
    /// The flag is true only when this call created the link.
    #[instrument(skip(self, input))]
    pub async fn attach_dentist(
        &self,
        clinic_id: Uuid,
        input: AttachDentist,
    ) -> Result<(ClinicDentist, bool)> {
        let identity = DentistIdentity {
            tax_id: TaxId::parse(PersonKind::Individual, &input.tax_id_number)?,
            details: PersonDetails::new(
                &input.legal_name,
                input.email.as_deref(),
                input.phone.as_deref(),
            )?,
        };

        let mut tx = self.store.begin().await?;
        let (row, created) = affiliation::attach_or_update(
            &mut tx,
            &*self.ids,
            &*self.clock,
            clinic_id,
            &identity,
            input.roles(),
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(dentist_id = %row.dentist.id, created, "dentist attached");
        Ok((row.into(), created))
    }

    /// One page of dentists actively linked to a clinic, oldest first.
    #[instrument(skip(self))]
    pub async fn list_clinic_dentists(
        &self,
        clinic_id: Uuid,
        page: PageRequest,
    ) -> Result<CursorPage<ClinicDentist>> {
        let mut session = self.store.session().await?;
        if session.find_clinic(clinic_id).await?.is_none() {
            return Err(Error::not_found("clinic not found"));
        }

        let rows = session
            .list_clinic_dentist_rows(clinic_id, page.cursor(), page.fetch_limit())
            .await?;
        Ok(CursorPage::from_overfetch(rows, &page, |r| r.dentist.id).map(Into::into))
    }

    #[instrument(skip(self))]
    pub async fn update_affiliation_roles(
        &self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        roles: RolePatch,
    ) -> Result<ClinicDentist> {
        let mut session = self.store.session().await?;
        let affiliation =
            affiliation::update_roles(&mut session, clinic_id, dentist_id, roles).await?;
        let row = session
            .dentist_row(dentist_id)
            .await?
            .ok_or_else(|| Error::not_found(DENTIST_NOT_FOUND))?;

        Ok(ClinicDentistRow {
            dentist: row.dentist,
            person: row.person,
            affiliation,
        }
        .into())
    }

    /// End a dentist's link to a clinic; the dentist's last link cannot go.
    #[instrument(skip(self))]
    pub async fn unlink_dentist(&self, clinic_id: Uuid, dentist_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        affiliation::end(&mut tx, clinic_id, dentist_id, &*self.clock).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn update_dentist(
        &self,
        dentist_id: Uuid,
        input: UpdateDentist,
    ) -> Result<DentistSummary> {
        if input.legal_name.is_none() && input.email.is_none() && input.phone.is_none() {
            return Err(Error::validation("at least one field must be provided"));
        }
        let patch = PersonPatch {
            legal_name: match input.legal_name.as_deref() {
                Some(name) => Some(LegalName::new(name)?.as_str().to_owned()),
                None => None,
            },
            trade_name: None,
            email: Email::optional(input.email.as_deref())?.map(Email::into_string),
            phone: text::phone(input.phone.as_deref())?,
        };

        let mut session = self.store.session().await?;
        let dentist = session
            .find_dentist(dentist_id)
            .await?
            .ok_or_else(|| Error::not_found(DENTIST_NOT_FOUND))?;
        let person = session
            .update_person(dentist.person_id, &patch, self.clock.now())
            .await?
            .ok_or_else(|| Error::not_found(DENTIST_NOT_FOUND))?;

        Ok(DentistSummary::from_parts(&dentist, person))
    }

    /// Soft-delete a dentist and its person, ending every active link.
    #[instrument(skip(self))]
    pub async fn delete_dentist(&self, dentist_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let dentist = tx
            .find_dentist(dentist_id)
            .await?
            .ok_or_else(|| Error::not_found(DENTIST_NOT_FOUND))?;

        let at = self.clock.now();
        let ended = tx.end_dentist_affiliations(dentist_id, at).await?;
        tx.delete_dentist(dentist_id, at).await?;
        tx.delete_person(dentist.person_id, at).await?;
        tx.commit().await?;

        tracing::debug!(%dentist_id, ended, "dentist deleted");
        Ok(())
    }
}
