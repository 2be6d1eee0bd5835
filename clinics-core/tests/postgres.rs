//! Registry over a real PostgreSQL
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p clinics-core -- --ignored

mod common;

use clinics_core::models::UpdateClinic;
use clinics_core::store::{create_pool, migrations, PgStore};
use clinics_core::{ErrorKind, PageRequest, Registry};
use uuid::Uuid;

use common::{attach, cnpj, cpf, create_clinic};

async fn registry() -> Registry<PgStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = create_pool(&url).await.expect("pool creation failed");
    migrations::run(&pool).await.expect("migrations failed");
    Registry::new(PgStore::new(pool))
}

/// Tax id sequence numbers that do not collide across runs.
fn fresh_seq() -> u32 {
    (Uuid::new_v4().as_u128() % 90_000_000) as u32 + 1
}

#[tokio::test]
#[ignore = "requires database"]
async fn create_and_read_clinic() {
    let registry = registry().await;
    let clinic = registry
        .create_clinic(create_clinic(&cnpj(fresh_seq()), "Acme Dental"))
        .await
        .unwrap()
        .clinic;

    let details = registry.get_clinic(clinic.id).await.unwrap();
    assert_eq!(details.clinic.legal_name, "Acme Dental");
    assert_eq!(details.bank_accounts.len(), 1);
    assert!(details.clinic.dentist_ids.is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn duplicate_clinic_is_conflict() {
    let registry = registry().await;
    let tax_id = cnpj(fresh_seq());
    registry
        .create_clinic(create_clinic(&tax_id, "Acme Dental"))
        .await
        .unwrap();

    let err = registry
        .create_clinic(create_clinic(&tax_id, "Acme Dental"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires database"]
async fn concurrent_attach_converges() {
    let registry = registry().await;
    let clinic = registry
        .create_clinic(create_clinic(&cnpj(fresh_seq()), "Acme Dental"))
        .await
        .unwrap()
        .clinic;
    let dentist_tax_id = cpf(fresh_seq());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let input = attach(&dentist_tax_id, Some(true), None);
            tokio::spawn(async move { registry.attach_dentist(clinic.id, input).await })
        })
        .collect();

    let mut created = 0;
    let mut dentist_ids = Vec::new();
    for handle in handles {
        let (row, was_created) = handle.await.expect("task panicked").unwrap();
        created += usize::from(was_created);
        dentist_ids.push(row.dentist.id);
    }
    assert!(created <= 1);
    dentist_ids.dedup();
    assert_eq!(dentist_ids.len(), 1);

    let page = registry
        .list_clinic_dentists(clinic.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires database"]
async fn concurrent_removals_keep_one_account() {
    let registry = registry().await;
    let clinic = registry
        .create_clinic(create_clinic(&cnpj(fresh_seq()), "Acme Dental"))
        .await
        .unwrap()
        .clinic;
    registry
        .update_clinic(
            clinic.id,
            UpdateClinic {
                bank_accounts: Some(vec![common::bank_account("341")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let accounts = registry.get_clinic(clinic.id).await.unwrap().bank_accounts;
    assert_eq!(accounts.len(), 2);

    let handles: Vec<_> = accounts
        .iter()
        .map(|account| {
            let registry = registry.clone();
            let input = UpdateClinic {
                bank_account_ids_to_remove: Some(vec![account.id.to_string()]),
                ..Default::default()
            };
            tokio::spawn(async move { registry.update_clinic(clinic.id, input).await })
        })
        .collect();

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(e) = handle.await.expect("task panicked") {
            failures.push(e.kind());
        }
    }
    assert_eq!(failures, vec![ErrorKind::Validation]);
    assert_eq!(
        registry.get_clinic(clinic.id).await.unwrap().bank_accounts.len(),
        1
    );
}
