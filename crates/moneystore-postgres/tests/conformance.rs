//! Live PostgreSQL tests.
//!
//! Set `MONEYSTORE_POSTGRES_URL` to a disposable database and run with
//! `cargo test -p moneystore-postgres -- --ignored --test-threads=1`.
//! Every test drops the moneystore tables first.

use moneystore_core::{
    conformance::{day, new_account, new_balance},
    Storage, StorageError,
};
use moneystore_postgres::PostgresStorage;

fn fresh_store() -> PostgresStorage {
    let url = std::env::var("MONEYSTORE_POSTGRES_URL")
        .expect("MONEYSTORE_POSTGRES_URL must point at a disposable database");
    let mut client = postgres::Client::connect(&url, postgres::NoTls).unwrap();
    client
        .batch_execute("DROP TABLE IF EXISTS balances; DROP TABLE IF EXISTS accounts;")
        .unwrap();
    client.close().unwrap();
    PostgresStorage::new(&url).unwrap()
}

moneystore_core::storage_conformance_tests!(fresh_store(), #[ignore]);

#[test]
#[ignore]
fn test_postgres_update_rolls_back_on_invalid_balance() {
    let store = fresh_store();
    let a = store
        .insert_account(&new_account("Current", "GBP", day(2021, 1, 1), None))
        .unwrap();
    let b = store.insert_balance(&a, &new_balance(day(2021, 3, 1), 250)).unwrap();

    let changes = new_account("Current", "GBP", day(2021, 1, 1), Some(day(2021, 2, 1)));
    assert!(matches!(
        store.update_account(&a, &changes),
        Err(StorageError::UpdateInvalidatesBalance { balance_id, .. }) if balance_id == b.id
    ));
    assert_eq!(store.select_account(a.id).unwrap(), a);
}

#[test]
#[ignore]
fn test_postgres_create_and_drop_database() {
    let url = std::env::var("MONEYSTORE_POSTGRES_URL").unwrap();
    let mut admin = postgres::Client::connect(&url, postgres::NoTls).unwrap();
    let owner: String = admin.query_one("SELECT current_user::text", &[]).unwrap().get(0);
    let exists = |admin: &mut postgres::Client| {
        admin
            .query_opt("SELECT datname FROM pg_database WHERE datname = $1", &[&"moneystore_provision_test"])
            .unwrap()
            .is_some()
    };

    let _ = moneystore_postgres::drop_database(&url, "moneystore_provision_test");
    moneystore_postgres::create_database(&url, "moneystore_provision_test", &owner).unwrap();
    assert!(exists(&mut admin));

    moneystore_postgres::drop_database(&url, "moneystore_provision_test").unwrap();
    assert!(!exists(&mut admin));
}
