//! In-memory adapter
//!
//! Same contract as the Postgres adapter, including unique and foreign key
//! violations. Each session holds the whole store exclusively, so
//! transactions are serializable; rollback restores a snapshot taken at
//! `begin`. [`MemoryStore::arm_race`] makes the next insert of a kind lose
//! a simulated concurrent race: the competing row is committed and the
//! insert fails with a unique violation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::records::*;
use super::{Queries, Store, StoreError, StoreResult, Transaction};
use crate::models::RolePatch;

/// Insert kinds that can be made to lose a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaceSite {
    Person,
    Dentist,
    Affiliation,
    User,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    persons: BTreeMap<Uuid, Person>,
    clinics: BTreeMap<Uuid, Clinic>,
    dentists: BTreeMap<Uuid, Dentist>,
    bank_accounts: BTreeMap<Uuid, BankAccount>,
    affiliations: BTreeMap<Uuid, Affiliation>,
    users: BTreeMap<Uuid, User>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    races: Arc<SyncMutex<HashSet<RaceSite>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next insert at `site` lose a concurrent creation race.
    pub fn arm_race(&self, site: RaceSite) {
        self.races
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(site);
    }

    /// Every person row, deleted ones included.
    pub async fn persons(&self) -> Vec<Person> {
        self.state.lock().await.persons.values().cloned().collect()
    }

    pub async fn dentists(&self) -> Vec<Dentist> {
        self.state.lock().await.dentists.values().cloned().collect()
    }

    /// Every affiliation row, ended ones included.
    pub async fn affiliations(&self) -> Vec<Affiliation> {
        self.state
            .lock()
            .await
            .affiliations
            .values()
            .cloned()
            .collect()
    }

    pub async fn bank_accounts(&self) -> Vec<BankAccount> {
        self.state
            .lock()
            .await
            .bank_accounts
            .values()
            .cloned()
            .collect()
    }

    async fn open(&self, transactional: bool) -> MemorySession {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = transactional.then(|| guard.clone());
        MemorySession {
            guard,
            snapshot,
            races: self.races.clone(),
        }
    }
}

/// Exclusive view of the store; transactional when it holds a snapshot.
pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    races: Arc<SyncMutex<HashSet<RaceSite>>>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

impl MemorySession {
    fn take_race(&self, site: RaceSite) -> bool {
        self.races
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&site)
    }

    /// Commit `apply` as another writer would: visible now and after rollback.
    fn commit_competitor(&mut self, apply: impl Fn(&mut MemoryState)) {
        apply(&mut self.guard);
        if let Some(snapshot) = self.snapshot.as_mut() {
            apply(snapshot);
        }
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_owned(),
    }
}

fn foreign_key(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_owned(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Session = MemorySession;
    type Tx = MemorySession;

    async fn session(&self) -> StoreResult<MemorySession> {
        Ok(self.open(false).await)
    }

    async fn begin(&self) -> StoreResult<MemorySession> {
        Ok(self.open(true).await)
    }

    async fn ping(&self) -> StoreResult<()> {
        drop(self.state.lock().await);
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemorySession {
    async fn lock_clinic(&mut self, clinic_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .guard
            .clinics
            .get(&clinic_id)
            .is_some_and(|c| c.status.is_active()))
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Queries for MemorySession {
    async fn find_person_by_tax_id(&mut self, tax_id_number: &str) -> StoreResult<Option<Person>> {
        Ok(self
            .guard
            .persons
            .values()
            .find(|p| p.status.is_active() && p.tax_id_number == tax_id_number)
            .cloned())
    }

    async fn insert_person(&mut self, person: &Person) -> StoreResult<()> {
        if self.take_race(RaceSite::Person) {
            let competitor = Person {
                id: Uuid::now_v7(),
                ..person.clone()
            };
            self.commit_competitor(|s| {
                s.persons.insert(competitor.id, competitor.clone());
            });
        }

        let taken = self
            .guard
            .persons
            .values()
            .any(|p| p.status.is_active() && p.tax_id_number == person.tax_id_number);
        if taken {
            return Err(unique("persons_tax_id_active_key"));
        }

        self.guard.persons.insert(person.id, person.clone());
        Ok(())
    }

    async fn update_person(
        &mut self,
        id: Uuid,
        patch: &PersonPatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Person>> {
        Ok(self
            .guard
            .persons
            .get_mut(&id)
            .filter(|p| p.status.is_active())
            .map(|p| {
                patch.apply(p, at);
                p.clone()
            }))
    }

    async fn delete_person(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        match self.guard.persons.get_mut(&id) {
            Some(p) if p.status.is_active() => {
                p.status = RecordStatus::Deleted(at);
                p.updated_at = at;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_clinic(&mut self, id: Uuid) -> StoreResult<Option<Clinic>> {
        Ok(self
            .guard
            .clinics
            .get(&id)
            .filter(|c| c.status.is_active())
            .cloned())
    }

    async fn insert_clinic(&mut self, clinic: &Clinic) -> StoreResult<()> {
        if !self.guard.persons.contains_key(&clinic.person_id) {
            return Err(foreign_key("clinics_person_id_fkey"));
        }
        let taken = self
            .guard
            .clinics
            .values()
            .any(|c| c.status.is_active() && c.person_id == clinic.person_id);
        if taken {
            return Err(unique("clinics_person_active_key"));
        }

        self.guard.clinics.insert(clinic.id, clinic.clone());
        Ok(())
    }

    async fn delete_clinic(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        match self.guard.clinics.get_mut(&id) {
            Some(c) if c.status.is_active() => {
                c.status = RecordStatus::Deleted(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn clinic_row(&mut self, id: Uuid) -> StoreResult<Option<ClinicRow>> {
        let state = &*self.guard;
        Ok(state
            .clinics
            .get(&id)
            .filter(|c| c.status.is_active())
            .and_then(|c| {
                state.persons.get(&c.person_id).map(|p| ClinicRow {
                    clinic: c.clone(),
                    person: p.clone(),
                })
            }))
    }

    async fn list_clinic_rows(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicRow>> {
        let state = &*self.guard;
        Ok(state
            .clinics
            .values()
            .filter(|c| c.status.is_active() && after.map_or(true, |a| c.id > a))
            .filter_map(|c| {
                state.persons.get(&c.person_id).map(|p| ClinicRow {
                    clinic: c.clone(),
                    person: p.clone(),
                })
            })
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn active_dentist_ids(&mut self, clinic_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Uuid)>> {
        let state = &*self.guard;
        let mut pairs: Vec<(Uuid, Uuid)> = state
            .affiliations
            .values()
            .filter(|a| a.is_active() && clinic_ids.contains(&a.clinic_id))
            .filter(|a| {
                state
                    .dentists
                    .get(&a.dentist_id)
                    .is_some_and(|d| d.status.is_active())
            })
            .map(|a| (a.clinic_id, a.dentist_id))
            .collect();
        pairs.sort();
        Ok(pairs)
    }

    async fn insert_bank_account(&mut self, account: &BankAccount) -> StoreResult<()> {
        if !self.guard.clinics.contains_key(&account.clinic_id) {
            return Err(foreign_key("bank_accounts_clinic_id_fkey"));
        }
        self.guard.bank_accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_bank_account(
        &mut self,
        id: Uuid,
        clinic_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        match self.guard.bank_accounts.get_mut(&id) {
            Some(a) if a.clinic_id == clinic_id && a.status.is_active() => {
                a.status = RecordStatus::Deleted(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<Vec<BankAccount>> {
        Ok(self
            .guard
            .bank_accounts
            .values()
            .filter(|a| a.clinic_id == clinic_id && a.status.is_active())
            .cloned()
            .collect())
    }

    async fn count_bank_accounts(&mut self, clinic_id: Uuid) -> StoreResult<i64> {
        let count = self
            .guard
            .bank_accounts
            .values()
            .filter(|a| a.clinic_id == clinic_id && a.status.is_active())
            .count();
        Ok(count as i64)
    }

    async fn find_dentist(&mut self, id: Uuid) -> StoreResult<Option<Dentist>> {
        Ok(self
            .guard
            .dentists
            .get(&id)
            .filter(|d| d.status.is_active())
            .cloned())
    }

    async fn find_dentist_by_person(&mut self, person_id: Uuid) -> StoreResult<Option<Dentist>> {
        Ok(self
            .guard
            .dentists
            .values()
            .find(|d| d.status.is_active() && d.person_id == person_id)
            .cloned())
    }

    async fn insert_dentist(&mut self, dentist: &Dentist) -> StoreResult<()> {
        if !self.guard.persons.contains_key(&dentist.person_id) {
            return Err(foreign_key("dentists_person_id_fkey"));
        }
        if self.take_race(RaceSite::Dentist) {
            let competitor = Dentist {
                id: Uuid::now_v7(),
                ..dentist.clone()
            };
            self.commit_competitor(|s| {
                s.dentists.insert(competitor.id, competitor.clone());
            });
        }

        let taken = self
            .guard
            .dentists
            .values()
            .any(|d| d.status.is_active() && d.person_id == dentist.person_id);
        if taken {
            return Err(unique("dentists_person_active_key"));
        }

        self.guard.dentists.insert(dentist.id, dentist.clone());
        Ok(())
    }

    async fn delete_dentist(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        match self.guard.dentists.get_mut(&id) {
            Some(d) if d.status.is_active() => {
                d.status = RecordStatus::Deleted(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn dentist_row(&mut self, id: Uuid) -> StoreResult<Option<DentistRow>> {
        let state = &*self.guard;
        Ok(state
            .dentists
            .get(&id)
            .filter(|d| d.status.is_active())
            .and_then(|d| {
                state.persons.get(&d.person_id).map(|p| DentistRow {
                    dentist: d.clone(),
                    person: p.clone(),
                })
            }))
    }

    async fn find_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
    ) -> StoreResult<Option<Affiliation>> {
        Ok(self
            .guard
            .affiliations
            .values()
            .find(|a| a.is_active() && a.clinic_id == clinic_id && a.dentist_id == dentist_id)
            .cloned())
    }

    async fn insert_affiliation(&mut self, affiliation: &Affiliation) -> StoreResult<()> {
        if !self.guard.clinics.contains_key(&affiliation.clinic_id) {
            return Err(foreign_key("clinic_dentists_clinic_id_fkey"));
        }
        if !self.guard.dentists.contains_key(&affiliation.dentist_id) {
            return Err(foreign_key("clinic_dentists_dentist_id_fkey"));
        }
        if self.take_race(RaceSite::Affiliation) {
            let competitor = Affiliation {
                id: Uuid::now_v7(),
                ..affiliation.clone()
            };
            self.commit_competitor(|s| {
                s.affiliations.insert(competitor.id, competitor.clone());
            });
        }

        let taken = self.guard.affiliations.values().any(|a| {
            a.is_active()
                && a.clinic_id == affiliation.clinic_id
                && a.dentist_id == affiliation.dentist_id
        });
        if taken {
            return Err(unique("clinic_dentists_active_key"));
        }

        self.guard
            .affiliations
            .insert(affiliation.id, affiliation.clone());
        Ok(())
    }

    async fn update_affiliation_roles(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        roles: RolePatch,
    ) -> StoreResult<Option<Affiliation>> {
        Ok(self
            .guard
            .affiliations
            .values_mut()
            .find(|a| a.is_active() && a.clinic_id == clinic_id && a.dentist_id == dentist_id)
            .map(|a| {
                if let Some(v) = roles.is_admin {
                    a.is_admin = v;
                }
                if let Some(v) = roles.is_legal_representative {
                    a.is_legal_representative = v;
                }
                a.clone()
            }))
    }

    async fn count_dentist_affiliations(&mut self, dentist_id: Uuid) -> StoreResult<i64> {
        let count = self
            .guard
            .affiliations
            .values()
            .filter(|a| a.is_active() && a.dentist_id == dentist_id)
            .count();
        Ok(count as i64)
    }

    async fn end_affiliation(
        &mut self,
        clinic_id: Uuid,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        Ok(end_where(&mut self.guard, at, |a| {
            a.clinic_id == clinic_id && a.dentist_id == dentist_id
        }))
    }

    async fn end_clinic_affiliations(
        &mut self,
        clinic_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        Ok(end_where(&mut self.guard, at, |a| a.clinic_id == clinic_id))
    }

    async fn end_dentist_affiliations(
        &mut self,
        dentist_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        Ok(end_where(&mut self.guard, at, |a| a.dentist_id == dentist_id))
    }

    async fn list_clinic_dentist_rows(
        &mut self,
        clinic_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<ClinicDentistRow>> {
        let state = &*self.guard;
        let mut rows: Vec<ClinicDentistRow> = state
            .affiliations
            .values()
            .filter(|a| a.is_active() && a.clinic_id == clinic_id)
            .filter(|a| after.map_or(true, |after| a.dentist_id > after))
            .filter_map(|a| {
                let dentist = state.dentists.get(&a.dentist_id)?;
                if !dentist.status.is_active() {
                    return None;
                }
                let person = state.persons.get(&dentist.person_id)?;
                Some(ClinicDentistRow {
                    dentist: dentist.clone(),
                    person: person.clone(),
                    affiliation: a.clone(),
                })
            })
            .collect();

        rows.sort_by_key(|r| r.dentist.id);
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .guard
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.take_race(RaceSite::User) {
            let competitor = User {
                id: Uuid::now_v7(),
                ..user.clone()
            };
            self.commit_competitor(|s| {
                s.users.insert(competitor.id, competitor.clone());
            });
        }

        let email = user.email.to_lowercase();
        if self.guard.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(unique("users_email_active_key"));
        }

        self.guard.users.insert(user.id, user.clone());
        Ok(())
    }
}

fn end_where(
    state: &mut MemoryState,
    at: DateTime<Utc>,
    matches: impl Fn(&Affiliation) -> bool,
) -> u64 {
    let mut ended = 0;
    for a in state.affiliations.values_mut() {
        if a.is_active() && matches(a) {
            a.ended_at = Some(at);
            ended += 1;
        }
    }
    ended
}
