//! Identity resolution
//!
//! Persons are deduplicated by normalized tax id. Creation is
//! find-or-create with a single retry: when the insert loses a race to a
//! concurrent writer (unique violation on the active tax id), the row is
//! re-read and used as if it had been found. Dentists are resolved the
//! same way, keyed on their person.

use uuid::Uuid;

use crate::ids::{Clock, IdGenerator};
use crate::models::{text, Email, LegalName, PersonKind, TaxId};
use crate::store::{Dentist, Person, PersonPatch, Queries, RecordStatus};
use crate::{Error, Result};

/// Validated mutable person fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDetails {
    pub legal_name: LegalName,
    pub trade_name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
}

impl PersonDetails {
    /// Validate caller input. Blank optional fields count as absent.
    pub fn new(legal_name: &str, email: Option<&str>, phone: Option<&str>) -> Result<Self> {
        Ok(Self {
            legal_name: LegalName::new(legal_name)?,
            trade_name: None,
            email: Email::optional(email)?,
            phone: text::phone(phone)?,
        })
    }

    pub fn with_trade_name(mut self, trade_name: Option<&str>) -> Result<Self> {
        self.trade_name = text::trade_name(trade_name)?;
        Ok(self)
    }

    /// Update applied to an existing person: the legal name always, the
    /// optional fields only when supplied.
    fn patch(&self) -> PersonPatch {
        PersonPatch {
            legal_name: Some(self.legal_name.as_str().to_owned()),
            trade_name: self.trade_name.clone(),
            email: self.email.as_ref().map(|e| e.as_str().to_owned()),
            phone: self.phone.clone(),
        }
    }
}

/// Find the active person holding `tax_id` and refresh its details, or
/// create one.
///
/// Fails with `Conflict` when the tax id belongs to a person of the other
/// kind.
pub async fn resolve_or_create_person<Q: Queries>(
    q: &mut Q,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    tax_id: &TaxId,
    details: &PersonDetails,
) -> Result<Person> {
    let existing = match q.find_person_by_tax_id(tax_id.as_str()).await? {
        Some(person) => person,
        None => {
            let now = clock.now();
            let person = Person {
                id: ids.next_id(),
                kind: tax_id.kind(),
                tax_id_number: tax_id.as_str().to_owned(),
                legal_name: details.legal_name.as_str().to_owned(),
                trade_name: details.trade_name.clone(),
                email: details.email.as_ref().map(|e| e.as_str().to_owned()),
                phone: details.phone.clone(),
                created_at: now,
                updated_at: now,
                status: RecordStatus::Active,
            };

            match q.insert_person(&person).await {
                Ok(()) => return Ok(person),
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!(
                        tax_id_type = tax_id.id_type().as_str(),
                        "person created concurrently, re-reading"
                    );
                    match q.find_person_by_tax_id(tax_id.as_str()).await? {
                        Some(person) => person,
                        None => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    if existing.kind != tax_id.kind() {
        return Err(Error::conflict(kind_mismatch(existing.kind)));
    }

    q.update_person(existing.id, &details.patch(), clock.now())
        .await?
        .ok_or_else(|| Error::not_found("person not found"))
}

fn kind_mismatch(held_by: PersonKind) -> &'static str {
    match held_by {
        PersonKind::Company => "tax_id is linked to a company person",
        PersonKind::Individual => "tax_id is linked to an individual person",
    }
}

/// Find the active dentist bound to `person_id`, or create one.
pub async fn resolve_or_create_dentist<Q: Queries>(
    q: &mut Q,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    person_id: Uuid,
) -> Result<Dentist> {
    if let Some(dentist) = q.find_dentist_by_person(person_id).await? {
        return Ok(dentist);
    }

    let dentist = Dentist {
        id: ids.next_id(),
        person_id,
        created_at: clock.now(),
        status: RecordStatus::Active,
    };

    match q.insert_dentist(&dentist).await {
        Ok(()) => Ok(dentist),
        Err(e) if e.is_unique_violation() => {
            tracing::debug!(%person_id, "dentist created concurrently, re-reading");
            match q.find_dentist_by_person(person_id).await? {
                Some(dentist) => Ok(dentist),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{FixedClock, UuidV7Generator};
    use crate::store::{MemoryStore, RaceSite, Store, Transaction};
    use crate::ErrorKind;
    use chrono::{TimeZone, Utc};

    const CPF: &str = "123.456.789-09";
    const CNPJ: &str = "04.252.011/0001-10";

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
    }

    fn individual() -> TaxId {
        TaxId::parse(PersonKind::Individual, CPF).unwrap()
    }

    #[test]
    fn details_reject_bad_email_before_storage() {
        let err = PersonDetails::new("Ana", Some("not-an-email"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn details_treat_blank_as_absent() {
        let details = PersonDetails::new(" Ana ", Some(" "), Some(""))
            .unwrap()
            .with_trade_name(Some(""))
            .unwrap();
        assert_eq!(details.legal_name.as_str(), "Ana");
        assert_eq!(details.email, None);
        assert_eq!(details.phone, None);
        assert_eq!(details.trade_name, None);
    }

    #[tokio::test]
    async fn creates_then_finds_and_updates() {
        let store = MemoryStore::new();
        let clock = clock();
        let mut session = store.session().await.unwrap();

        let details = PersonDetails::new("Ana", None, None).unwrap();
        let created =
            resolve_or_create_person(&mut session, &UuidV7Generator, &clock, &individual(), &details)
                .await
                .unwrap();
        assert_eq!(created.tax_id_number, "12345678909");

        let later = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        clock.set(later);
        let details = PersonDetails::new("Ana Souza", Some("ana@example.com"), None).unwrap();
        let found =
            resolve_or_create_person(&mut session, &UuidV7Generator, &clock, &individual(), &details)
                .await
                .unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.legal_name, "Ana Souza");
        assert_eq!(found.email.as_deref(), Some("ana@example.com"));
        assert_eq!(found.updated_at, later);
        assert_eq!(found.created_at, created.created_at);
    }

    #[tokio::test]
    async fn lost_insert_race_reuses_winner() {
        let store = MemoryStore::new();
        store.arm_race(RaceSite::Person);
        let mut tx = store.begin().await.unwrap();

        let details = PersonDetails::new("Ana", None, None).unwrap();
        let person =
            resolve_or_create_person(&mut tx, &UuidV7Generator, &clock(), &individual(), &details)
                .await
                .unwrap();
        tx.commit().await.unwrap();

        let persons = store.persons().await;
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].id, person.id);
    }

    #[tokio::test]
    async fn kind_mismatch_is_conflict() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();

        // Simulate legacy data: a company row holding an individual tax id.
        let now = Utc::now();
        session
            .insert_person(&Person {
                id: Uuid::now_v7(),
                kind: PersonKind::Company,
                tax_id_number: "12345678909".into(),
                legal_name: "Legacy".into(),
                trade_name: None,
                email: None,
                phone: None,
                created_at: now,
                updated_at: now,
                status: RecordStatus::Active,
            })
            .await
            .unwrap();

        let details = PersonDetails::new("Ana", None, None).unwrap();
        let err =
            resolve_or_create_person(&mut session, &UuidV7Generator, &clock(), &individual(), &details)
                .await
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.detail(), "tax_id is linked to a company person");
    }

    #[tokio::test]
    async fn company_tax_id_resolves_company() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();

        let tax_id = TaxId::parse(PersonKind::Company, CNPJ).unwrap();
        let details = PersonDetails::new("Acme Dental", None, None).unwrap();
        let person = resolve_or_create_person(&mut session, &UuidV7Generator, &clock(), &tax_id, &details)
            .await
            .unwrap();
        assert_eq!(person.kind, PersonKind::Company);
        assert_eq!(person.tax_id_number, "04252011000110");
    }

    #[tokio::test]
    async fn dentist_race_reuses_winner() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let details = PersonDetails::new("Ana", None, None).unwrap();
        let person =
            resolve_or_create_person(&mut tx, &UuidV7Generator, &clock(), &individual(), &details)
                .await
                .unwrap();

        store.arm_race(RaceSite::Dentist);
        let dentist = resolve_or_create_dentist(&mut tx, &UuidV7Generator, &clock(), person.id)
            .await
            .unwrap();
        let again = resolve_or_create_dentist(&mut tx, &UuidV7Generator, &clock(), person.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(dentist.id, again.id);
        assert_eq!(store.dentists().await.len(), 1);
    }
}
