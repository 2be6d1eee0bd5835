//! Bank account invariant
//!
//! A clinic keeps at least one active bank account after every successful
//! write. The check is a count, which no constraint can express, so
//! concurrent changes to one clinic's accounts are serialized on the clinic
//! row lock. Only the net effect of a request is checked: adding one account
//! and removing the only old one in the same request is accepted.

use uuid::Uuid;

use crate::ids::{Clock, IdGenerator};
use crate::models::NewBankAccount;
use crate::store::{BankAccount, Queries, RecordStatus, Transaction};
use crate::{Error, Result};

/// Account changes requested for one clinic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankAccountChanges {
    pub add: Vec<NewBankAccount>,
    pub remove: Vec<Uuid>,
}

impl BankAccountChanges {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Apply `changes` to a clinic inside `tx`.
///
/// Locks the clinic row before touching anything, inserts the additions,
/// soft-deletes the removals, then requires at least one active account to
/// remain. On error the caller must roll back.
pub async fn apply_bank_account_changes<T: Transaction>(
    tx: &mut T,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    clinic_id: Uuid,
    changes: &BankAccountChanges,
) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    if !tx.lock_clinic(clinic_id).await? {
        return Err(Error::not_found("clinic not found"));
    }

    insert_bank_accounts(tx, ids, clock, clinic_id, &changes.add).await?;
    remove_bank_accounts(tx, clock, clinic_id, &changes.remove).await?;

    if tx.count_bank_accounts(clinic_id).await? == 0 {
        return Err(Error::validation(
            "clinic must retain at least one active bank account",
        ));
    }
    Ok(())
}

pub(crate) async fn insert_bank_accounts<Q: Queries>(
    q: &mut Q,
    ids: &dyn IdGenerator,
    clock: &dyn Clock,
    clinic_id: Uuid,
    accounts: &[NewBankAccount],
) -> Result<()> {
    for account in accounts {
        q.insert_bank_account(&BankAccount {
            id: ids.next_id(),
            clinic_id,
            bank_code: account.bank_code.clone(),
            branch_number: account.branch_number.clone(),
            account_number: account.account_number.clone(),
            created_at: clock.now(),
            status: RecordStatus::Active,
        })
        .await?;
    }
    Ok(())
}

async fn remove_bank_accounts<Q: Queries>(
    q: &mut Q,
    clock: &dyn Clock,
    clinic_id: Uuid,
    account_ids: &[Uuid],
) -> Result<()> {
    let at = clock.now();
    for id in account_ids {
        // Also zero when the account belongs to another clinic.
        if q.delete_bank_account(*id, clinic_id, at).await? == 0 {
            return Err(Error::not_found("bank account not found"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SystemClock, UuidV7Generator};
    use crate::models::{BankAccountInput, PersonKind};
    use crate::store::{Clinic, MemoryStore, Person, Store};
    use crate::ErrorKind;
    use chrono::Utc;

    fn account(code: &str) -> NewBankAccount {
        NewBankAccount::new(&BankAccountInput::new(code, "1234", "998877")).unwrap()
    }

    /// Clinic with one committed account; returns (clinic id, account id).
    async fn seeded(store: &MemoryStore) -> (Uuid, Uuid) {
        let mut s = store.session().await.unwrap();
        let now = Utc::now();
        let person = Person {
            id: Uuid::now_v7(),
            kind: PersonKind::Company,
            tax_id_number: "04252011000110".into(),
            legal_name: "Acme Dental".into(),
            trade_name: None,
            email: None,
            phone: None,
            created_at: now,
            updated_at: now,
            status: RecordStatus::Active,
        };
        s.insert_person(&person).await.unwrap();
        let clinic_id = Uuid::now_v7();
        s.insert_clinic(&Clinic {
            id: clinic_id,
            person_id: person.id,
            created_at: now,
            status: RecordStatus::Active,
        })
        .await
        .unwrap();
        insert_bank_accounts(&mut s, &UuidV7Generator, &SystemClock, clinic_id, &[account("001")])
            .await
            .unwrap();
        let accounts = s.list_bank_accounts(clinic_id).await.unwrap();
        (clinic_id, accounts[0].id)
    }

    async fn active_accounts(store: &MemoryStore, clinic_id: Uuid) -> Vec<BankAccount> {
        store
            .bank_accounts()
            .await
            .into_iter()
            .filter(|a| a.clinic_id == clinic_id && a.status.is_active())
            .collect()
    }

    #[tokio::test]
    async fn removing_last_account_rolls_back_everything() {
        let store = MemoryStore::new();
        let (clinic_id, only) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let changes = BankAccountChanges {
            add: vec![],
            remove: vec![only],
        };
        let err = apply_bank_account_changes(&mut tx, &UuidV7Generator, &SystemClock, clinic_id, &changes)
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.detail(), "clinic must retain at least one active bank account");
        let remaining = active_accounts(&store, clinic_id).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, only);
    }

    #[tokio::test]
    async fn net_effect_replacement_is_accepted() {
        let store = MemoryStore::new();
        let (clinic_id, old) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let changes = BankAccountChanges {
            add: vec![account("341")],
            remove: vec![old],
        };
        apply_bank_account_changes(&mut tx, &UuidV7Generator, &SystemClock, clinic_id, &changes)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let remaining = active_accounts(&store, clinic_id).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].bank_code, "341");
    }

    #[tokio::test]
    async fn unknown_account_is_not_found_and_additions_roll_back() {
        let store = MemoryStore::new();
        let (clinic_id, _) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let changes = BankAccountChanges {
            add: vec![account("341")],
            remove: vec![Uuid::now_v7()],
        };
        let err = apply_bank_account_changes(&mut tx, &UuidV7Generator, &SystemClock, clinic_id, &changes)
            .await
            .unwrap_err();
        drop(tx);

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(active_accounts(&store, clinic_id).await.len(), 1);
    }

    #[tokio::test]
    async fn account_of_another_clinic_is_not_found() {
        let store = MemoryStore::new();
        let (clinic_id, _) = seeded(&store).await;

        let other_clinic = {
            let mut s = store.session().await.unwrap();
            let now = Utc::now();
            let person = Person {
                id: Uuid::now_v7(),
                kind: PersonKind::Company,
                tax_id_number: "11222333000181".into(),
                legal_name: "Other".into(),
                trade_name: None,
                email: None,
                phone: None,
                created_at: now,
                updated_at: now,
                status: RecordStatus::Active,
            };
            s.insert_person(&person).await.unwrap();
            let id = Uuid::now_v7();
            s.insert_clinic(&Clinic {
                id,
                person_id: person.id,
                created_at: now,
                status: RecordStatus::Active,
            })
            .await
            .unwrap();
            id
        };

        let foreign = active_accounts(&store, clinic_id).await[0].id;
        let mut tx = store.begin().await.unwrap();
        let changes = BankAccountChanges {
            add: vec![account("341")],
            remove: vec![foreign],
        };
        let err = apply_bank_account_changes(&mut tx, &UuidV7Generator, &SystemClock, other_clinic, &changes)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deleted_clinic_cannot_be_locked() {
        let store = MemoryStore::new();
        let (clinic_id, _) = seeded(&store).await;
        {
            let mut s = store.session().await.unwrap();
            s.delete_clinic(clinic_id, Utc::now()).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let changes = BankAccountChanges {
            add: vec![account("341")],
            remove: vec![],
        };
        let err = apply_bank_account_changes(&mut tx, &UuidV7Generator, &SystemClock, clinic_id, &changes)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
