//! Clinic use cases

use tracing::instrument;
use uuid::Uuid;

use super::views::dentist_ids_for;
use super::Registry;
use crate::guard::{apply_bank_account_changes, insert_bank_accounts, BankAccountChanges};
use crate::identity::{resolve_or_create_person, PersonDetails};
use crate::ids::is_time_ordered;
use crate::models::{
    text, ClinicDetails, ClinicSummary, CreateClinic, Email, LegalName, NewBankAccount, PersonKind,
    TaxId, UpdateClinic,
};
use crate::pagination::{CursorPage, PageRequest};
use crate::store::{Clinic, PersonPatch, Queries, RecordStatus, Store, Transaction};
use crate::{Error, Result};

const CLINIC_NOT_FOUND: &str = "clinic not found";

impl<S: Store> Registry<S> {
    /// Register a clinic with its company identity and initial bank accounts.
    ///
    /// Returns the clinic as stored, accounts included.
    #[instrument(skip_all)]
    pub async fn create_clinic(&self, input: CreateClinic) -> Result<ClinicDetails> {
        let tax_id = TaxId::parse(PersonKind::Company, &input.tax_id_number)?;
        let details = PersonDetails::new(
            &input.legal_name,
            input.email.as_deref(),
            input.phone.as_deref(),
        )?
        .with_trade_name(input.trade_name.as_deref())?;
        if input.bank_accounts.is_empty() {
            return Err(Error::validation(
                "bank_accounts must contain at least one account",
            ));
        }
        let accounts = NewBankAccount::list(&input.bank_accounts)?;

        let mut tx = self.store.begin().await?;
        let person =
            resolve_or_create_person(&mut tx, &*self.ids, &*self.clock, &tax_id, &details).await?;

        let clinic = Clinic {
            id: self.ids.next_id(),
            person_id: person.id,
            created_at: self.clock.now(),
            status: RecordStatus::Active,
        };
        tx.insert_clinic(&clinic).await?;
        insert_bank_accounts(&mut tx, &*self.ids, &*self.clock, clinic.id, &accounts).await?;
        let stored = load_details(&mut tx, clinic.id).await?;
        tx.commit().await?;

        tracing::debug!(clinic_id = %clinic.id, "clinic created");
        Ok(stored)
    }

    /// Partially update a clinic's identity and bank accounts.
    ///
    /// The result reflects the net effect of additions and removals.
    #[instrument(skip(self, input))]
    pub async fn update_clinic(&self, clinic_id: Uuid, input: UpdateClinic) -> Result<ClinicDetails> {
        if input.is_empty() {
            return Err(Error::validation("at least one field must be provided"));
        }
        let patch = person_patch(&input)?;
        let changes = bank_account_changes(&input)?;

        let mut tx = self.store.begin().await?;
        let clinic = tx
            .find_clinic(clinic_id)
            .await?
            .ok_or_else(|| Error::not_found(CLINIC_NOT_FOUND))?;

        apply_bank_account_changes(&mut tx, &*self.ids, &*self.clock, clinic_id, &changes).await?;

        if let Some(patch) = patch {
            tx.update_person(clinic.person_id, &patch, self.clock.now())
                .await?
                .ok_or_else(|| Error::not_found(CLINIC_NOT_FOUND))?;
        }
        let details = load_details(&mut tx, clinic_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Clinic with its active bank accounts.
    #[instrument(skip(self))]
    pub async fn get_clinic(&self, clinic_id: Uuid) -> Result<ClinicDetails> {
        let mut session = self.store.session().await?;
        load_details(&mut session, clinic_id).await
    }

    /// One page of active clinics, oldest first.
    #[instrument(skip(self))]
    pub async fn list_clinics(&self, page: PageRequest) -> Result<CursorPage<ClinicSummary>> {
        let mut session = self.store.session().await?;
        let rows = session
            .list_clinic_rows(page.cursor(), page.fetch_limit())
            .await?;
        let rows = CursorPage::from_overfetch(rows, &page, |r| r.clinic.id);

        let clinic_ids: Vec<Uuid> = rows.items.iter().map(|r| r.clinic.id).collect();
        let pairs = session.active_dentist_ids(&clinic_ids).await?;

        Ok(rows.map(|row| {
            let dentist_ids = dentist_ids_for(&pairs, row.clinic.id);
            ClinicSummary::from_row(row, dentist_ids)
        }))
    }

    /// Soft-delete a clinic and its person, ending every active link.
    ///
    /// Bank accounts are left as they are; they are unreachable once the
    /// clinic is gone.
    #[instrument(skip(self))]
    pub async fn delete_clinic(&self, clinic_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if !tx.lock_clinic(clinic_id).await? {
            return Err(Error::not_found(CLINIC_NOT_FOUND));
        }
        let clinic = tx
            .find_clinic(clinic_id)
            .await?
            .ok_or_else(|| Error::not_found(CLINIC_NOT_FOUND))?;

        let at = self.clock.now();
        let ended = tx.end_clinic_affiliations(clinic_id, at).await?;
        tx.delete_clinic(clinic_id, at).await?;
        tx.delete_person(clinic.person_id, at).await?;
        tx.commit().await?;

        tracing::debug!(%clinic_id, ended, "clinic deleted");
        Ok(())
    }
}

async fn load_details<Q: Queries>(q: &mut Q, clinic_id: Uuid) -> Result<ClinicDetails> {
    let row = q
        .clinic_row(clinic_id)
        .await?
        .ok_or_else(|| Error::not_found(CLINIC_NOT_FOUND))?;
    let pairs = q.active_dentist_ids(&[clinic_id]).await?;
    let bank_accounts = q
        .list_bank_accounts(clinic_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(ClinicDetails {
        clinic: ClinicSummary::from_row(row, dentist_ids_for(&pairs, clinic_id)),
        bank_accounts,
    })
}

/// Person fields to change, or `None` when the update leaves them alone.
fn person_patch(input: &UpdateClinic) -> Result<Option<PersonPatch>> {
    if !input.touches_person() {
        return Ok(None);
    }

    let legal_name = match input.legal_name.as_deref() {
        Some(name) => Some(LegalName::new(name)?.as_str().to_owned()),
        None => None,
    };

    Ok(Some(PersonPatch {
        legal_name,
        trade_name: text::trade_name(input.trade_name.as_deref())?,
        email: Email::optional(input.email.as_deref())?.map(Email::into_string),
        phone: text::phone(input.phone.as_deref())?,
    }))
}

fn bank_account_changes(input: &UpdateClinic) -> Result<BankAccountChanges> {
    let add = match &input.bank_accounts {
        None => Vec::new(),
        Some(accounts) if accounts.is_empty() => {
            return Err(Error::validation(
                "bank_accounts must contain at least one account when provided",
            ))
        }
        Some(accounts) => NewBankAccount::list(accounts)?,
    };

    let remove = match &input.bank_account_ids_to_remove {
        None => Vec::new(),
        Some(ids) if ids.is_empty() => {
            return Err(Error::validation(
                "bank_account_ids_to_remove must contain at least one id when provided",
            ))
        }
        Some(ids) => ids
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                Uuid::parse_str(raw.trim())
                    .ok()
                    .filter(is_time_ordered)
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "bank_account_ids_to_remove[{}] must be a UUIDv7",
                            i
                        ))
                    })
            })
            .collect::<Result<_>>()?,
    };

    Ok(BankAccountChanges { add, remove })
}
