//! Behaviour every [`Storage`] implementation must share.
//!
//! Each check expects a fresh, empty store. Backends run the whole set with
//! [`storage_conformance_tests!`](crate::storage_conformance_tests).

use time::{Date, Duration, Month};

use crate::{
    models::{
        stored::{StoredAccount, StoredBalance, UNASSIGNED_ID},
        Account, Balance, CurrencyCode, FieldError, Money,
    },
    storage::{Storage, StorageError},
};

pub fn day(year: i32, month: u8, d: u8) -> Date {
    let month = Month::try_from(month).expect("valid month");
    Date::from_calendar_date(year, month, d).expect("valid date")
}

pub fn currency(code: &str) -> CurrencyCode {
    CurrencyCode::new(code).expect("valid currency code")
}

pub fn new_account(name: &str, code: &str, opened: Date, closed: Option<Date>) -> Account {
    let account = Account::new(name, currency(code), opened).expect("valid account");
    match closed {
        Some(c) => account.with_closed(c).expect("valid close date"),
        None => account,
    }
}

pub fn new_balance(date: Date, amount: i64) -> Balance {
    Balance::new(date, Money::new(amount, currency("GBP")))
}

fn insert_with_balances(store: &dyn Storage, account: Account, dates: &[Date]) -> (StoredAccount, Vec<StoredBalance>) {
    let stored = store.insert_account(&account).expect("inserting account");
    let balances = dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            store
                .insert_balance(&stored, &new_balance(*d, i as i64 * 100))
                .expect("inserting balance")
        })
        .collect();
    (stored, balances)
}

pub fn inserts_and_selects_accounts(store: &dyn Storage) {
    assert!(store.select_accounts().unwrap().is_empty());

    let a = store
        .insert_account(&new_account("A", "JPY", day(2015, 3, 1), None))
        .unwrap();
    let b = store
        .insert_account(&new_account("B", "EUR", day(2014, 3, 1), Some(day(2016, 1, 1))))
        .unwrap();
    assert!(a.id > 0);
    assert!(b.id > a.id);
    assert_ne!(a, b);

    let all = store.select_accounts().unwrap();
    assert_eq!(all, vec![a.clone(), b.clone()]);
    assert_eq!(store.select_account(a.id).unwrap(), a);
    assert_eq!(store.select_account(b.id).unwrap(), b);
}

pub fn insert_assigns_id_and_keeps_fields(store: &dyn Storage) {
    let account = new_account("TEST", "GBP", day(2000, 1, 1), Some(day(2001, 1, 1)));
    let inserted = store.insert_account(&account).unwrap();
    assert!(inserted.id > 0);
    assert_eq!(inserted.name(), "TEST");
    assert_eq!(inserted.opened(), day(2000, 1, 1));
    assert_eq!(inserted.closed(), Some(day(2001, 1, 1)));
    assert_eq!(inserted.deleted_at, None);

    let apostrophe = new_account("Account With'Apostrophe", "GBP", day(2000, 1, 1), None);
    let inserted = store.insert_account(&apostrophe).unwrap();
    assert_eq!(store.select_account(inserted.id).unwrap().name(), "Account With'Apostrophe");
}

pub fn rejects_invalid_accounts(store: &dyn Storage) {
    let mut nameless = new_account("X", "GBP", day(2000, 1, 1), None);
    nameless.name = String::new();
    assert!(matches!(store.insert_account(&nameless), Err(StorageError::InvalidField(_))));

    let mut reversed = new_account("X", "GBP", day(2000, 1, 2), None);
    reversed.closed = Some(day(2000, 1, 1));
    assert!(matches!(store.insert_account(&reversed), Err(StorageError::InvalidField(_))));

    let mut ancient = new_account("X", "GBP", day(2000, 1, 1), None);
    ancient.opened = day(-1, 1, 1);
    assert!(matches!(
        store.insert_account(&ancient),
        Err(StorageError::InvalidField(FieldError::UnsupportedYear(_)))
    ));

    assert!(store.select_accounts().unwrap().is_empty());
}

pub fn missing_account_is_not_found(store: &dyn Storage) {
    assert!(matches!(store.select_account(9_999_999), Err(StorageError::AccountNotFound(9_999_999))));
    let ghost = StoredAccount::new(424_242, new_account("Ghost", "GBP", day(2000, 1, 1), None));
    assert!(matches!(store.validate_account(&ghost), Err(StorageError::AccountNotFound(424_242))));
}

pub fn selects_open_accounts(store: &dyn Storage) {
    let mut open = Vec::new();
    for i in 0..5 {
        let name = format!("open {i}");
        open.push(store.insert_account(&new_account(&name, "GBP", day(2020, 1, 1), None)).unwrap());
        let name = format!("closed {i}");
        store
            .insert_account(&new_account(&name, "GBP", day(2020, 1, 1), Some(day(2021, 1, 1))))
            .unwrap();
    }
    let mut deleted = store.insert_account(&new_account("gone", "GBP", day(2020, 1, 1), None)).unwrap();
    store.delete_account(&mut deleted).unwrap();

    let selected = store.select_open_accounts().unwrap();
    assert_eq!(selected, open);
    assert!(selected.iter().all(|a| a.is_open()));
    assert!(selected.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(store.select_accounts().unwrap().len(), 10);
}

pub fn validates_accounts(store: &dyn Storage) {
    let a = store
        .insert_account(&new_account("A", "GBP", day(2019, 6, 1), None))
        .unwrap();
    assert!(store.validate_account(&a).is_ok());
    assert!(store.validate_account(&a).is_ok());

    let mut stale = a.clone();
    stale.account.name = "Not A".to_string();
    assert!(matches!(
        store.validate_account(&stale),
        Err(StorageError::AccountDifferentInStoreAndRuntime(id)) if id == a.id
    ));

    let mut stale = a.clone();
    stale.account.closed = Some(day(2019, 7, 1));
    assert!(matches!(
        store.validate_account(&stale),
        Err(StorageError::AccountDifferentInStoreAndRuntime(_))
    ));
}

pub fn soft_deletes_accounts(store: &dyn Storage) {
    let mut a = store
        .insert_account(&new_account("TEST", "GBP", day(2000, 1, 1), Some(day(2001, 1, 1))))
        .unwrap();
    let stale = a.clone();
    let keep = store.insert_account(&new_account("Keep", "GBP", day(2000, 1, 1), None)).unwrap();

    store.delete_account(&mut a).unwrap();
    assert!(a.is_deleted());
    assert!(matches!(store.validate_account(&a), Err(StorageError::AccountDeleted(id)) if id == a.id));
    assert!(matches!(store.validate_account(&a), Err(StorageError::AccountDeleted(_))));
    assert!(matches!(
        store.validate_account(&stale),
        Err(StorageError::AccountDifferentInStoreAndRuntime(_))
    ));

    assert_eq!(store.select_accounts().unwrap(), vec![keep]);
    let selected = store.select_account(a.id).unwrap();
    assert_eq!(selected, a);

    assert!(matches!(store.delete_account(&mut a), Err(StorageError::AccountDeleted(_))));
    let changes = new_account("Renamed", "GBP", day(2000, 1, 1), None);
    assert!(matches!(store.update_account(&a, &changes), Err(StorageError::AccountDeleted(_))));
    assert!(matches!(
        store.insert_balance(&a, &new_balance(day(2000, 6, 1), 1)),
        Err(StorageError::AccountDeleted(_))
    ));
}

pub fn inserts_balances_within_range(store: &dyn Storage) {
    let opened = day(2000, 1, 1);
    let closed = day(2001, 1, 1);
    let a = store.insert_account(&new_account("TEST", "GBP", opened, Some(closed))).unwrap();
    assert!(store.select_account_balances(&a).unwrap().is_empty());

    let b = new_balance(opened, 1234);
    let inserted = store.insert_balance(&a, &b).unwrap();
    assert!(inserted.is_persisted());
    assert_eq!(inserted.balance, b);

    let before = opened - Duration::days(1);
    assert!(matches!(
        store.insert_balance(&a, &new_balance(before, 1)),
        Err(StorageError::DateOutOfAccountTimeRange(_))
    ));
    assert!(matches!(
        store.insert_balance(&a, &new_balance(closed, 1)),
        Err(StorageError::DateOutOfAccountTimeRange(_))
    ));
    assert_eq!(store.select_account_balances(&a).unwrap(), vec![inserted]);

    let mut stale = a.clone();
    stale.account.name = "Other".to_string();
    assert!(matches!(
        store.insert_balance(&stale, &new_balance(opened, 1)),
        Err(StorageError::AccountDifferentInStoreAndRuntime(_))
    ));
}

pub fn orders_balances_by_date_then_id(store: &dyn Storage) {
    let dates = [day(2020, 1, 7), day(2020, 1, 3), day(2020, 1, 5), day(2020, 1, 1), day(2020, 1, 5)];
    let (a, inserted) = insert_with_balances(store, new_account("A", "GBP", day(2020, 1, 1), None), &dates);
    let selected = store.select_account_balances(&a).unwrap();
    assert_eq!(selected.len(), 5);
    assert!(selected
        .windows(2)
        .all(|w| (w[0].date(), w[0].id) < (w[1].date(), w[1].id)));
    for b in &inserted {
        assert!(selected.contains(b));
    }
}

pub fn validates_balance_ownership(store: &dyn Storage) {
    let (a, a_balances) = insert_with_balances(
        store,
        new_account("A", "GBP", day(2020, 1, 1), None),
        &[day(2020, 2, 1), day(2020, 3, 1)],
    );
    let (b, b_balances) = insert_with_balances(
        store,
        new_account("B", "GBP", day(2020, 1, 1), None),
        &[day(2020, 2, 1)],
    );

    for own in &a_balances {
        assert!(store.validate_balance(&a, own).is_ok());
    }
    assert!(matches!(
        store.validate_balance(&b, &a_balances[0]),
        Err(StorageError::InvalidAccountBalance { account_id, balance_id })
            if account_id == b.id && balance_id == a_balances[0].id
    ));
    assert!(store.validate_balance(&b, &b_balances[0]).is_ok());

    let unsaved = StoredBalance::new(UNASSIGNED_ID, new_balance(day(2020, 5, 5), 0));
    assert!(store.validate_balance(&b, &unsaved).is_ok());
    let early = StoredBalance::new(UNASSIGNED_ID, new_balance(day(2019, 5, 5), 0));
    assert!(matches!(
        store.validate_balance(&b, &early),
        Err(StorageError::DateOutOfAccountTimeRange(_))
    ));
}

pub fn selects_balance_by_id_for_owner_only(store: &dyn Storage) {
    let (a, a_balances) = insert_with_balances(
        store,
        new_account("A", "GBP", day(2020, 1, 1), None),
        &[day(2020, 2, 1)],
    );
    let (b, _) = insert_with_balances(store, new_account("B", "GBP", day(2020, 1, 1), None), &[]);

    assert_eq!(store.select_balance(&a, a_balances[0].id).unwrap(), a_balances[0]);
    assert!(matches!(
        store.select_balance(&b, a_balances[0].id),
        Err(StorageError::BalanceNotFound { account_id, .. }) if account_id == b.id
    ));
}

pub fn balance_at_date_prefers_latest_date_then_highest_id(store: &dyn Storage) {
    let dates = [day(2020, 1, 1), day(2020, 1, 3), day(2020, 1, 5), day(2020, 1, 5), day(2020, 1, 7)];
    let (a, inserted) = insert_with_balances(store, new_account("A", "GBP", day(2020, 1, 1), None), &dates);

    let expected = inserted[2].id.max(inserted[3].id);
    assert_eq!(store.balance_at_date(&a, day(2020, 1, 6)).unwrap().id, expected);
    assert_eq!(store.balance_at_date(&a, day(2020, 1, 5)).unwrap().id, expected);
    assert_eq!(store.balance_at_date(&a, day(2020, 1, 7)).unwrap(), inserted[4]);
    assert_eq!(store.balance_at_date(&a, day(2030, 1, 1)).unwrap(), inserted[4]);
    assert_eq!(store.balance_at_date(&a, day(2020, 1, 2)).unwrap(), inserted[0]);
    assert!(matches!(
        store.balance_at_date(&a, day(2019, 12, 31)),
        Err(StorageError::NoBalances)
    ));

    let (empty, _) = insert_with_balances(store, new_account("B", "GBP", day(2020, 1, 1), None), &[]);
    assert!(matches!(store.balance_at_date(&empty, day(2020, 1, 6)), Err(StorageError::NoBalances)));
}

pub fn updates_balances(store: &dyn Storage) {
    let (a, a_balances) = insert_with_balances(
        store,
        new_account("A", "GBP", day(2020, 1, 1), Some(day(2021, 1, 1))),
        &[day(2020, 2, 1)],
    );
    let (b, b_balances) = insert_with_balances(
        store,
        new_account("B", "GBP", day(2020, 1, 1), None),
        &[day(2020, 2, 1)],
    );

    let changes = Balance::new(day(2020, 6, 30), Money::new(-5000, currency("GBP")));
    let updated = store.update_balance(&a, &a_balances[0], &changes).unwrap();
    assert_eq!(updated.id, a_balances[0].id);
    assert_eq!(updated.balance, changes);
    assert_eq!(store.select_account_balances(&a).unwrap(), vec![updated]);

    let out_of_range = new_balance(day(2021, 1, 1), 1);
    assert!(matches!(
        store.update_balance(&a, &updated, &out_of_range),
        Err(StorageError::DateOutOfAccountTimeRange(_))
    ));
    assert!(matches!(
        store.update_balance(&a, &b_balances[0], &changes),
        Err(StorageError::InvalidAccountBalance { .. })
    ));
    assert_eq!(store.select_account_balances(&a).unwrap(), vec![updated]);
    assert_eq!(store.select_account_balances(&b).unwrap(), b_balances);

    let unsaved = StoredBalance::new(UNASSIGNED_ID, new_balance(day(2020, 3, 1), 7));
    assert!(matches!(
        store.update_balance(&a, &unsaved, &new_balance(day(2020, 3, 1), 99)),
        Err(StorageError::InvalidAccountBalance { balance_id: UNASSIGNED_ID, .. })
    ));
    assert_eq!(store.select_account_balances(&a).unwrap(), vec![updated]);
}

pub fn updates_accounts_without_balances(store: &dyn Storage) {
    let a = store.insert_account(&new_account("A", "JPY", day(2020, 1, 1), None)).unwrap();
    let changes = new_account("B", "GBP", day(2020, 1, 2), Some(day(2020, 1, 3)));
    let updated = store.update_account(&a, &changes).unwrap();
    assert_eq!(updated.id, a.id);
    assert_eq!(updated.account, changes);
    assert_eq!(store.select_account(a.id).unwrap(), updated);
    assert!(store.validate_account(&updated).is_ok());
    assert!(matches!(
        store.validate_account(&a),
        Err(StorageError::AccountDifferentInStoreAndRuntime(_))
    ));
}

pub fn updates_accounts_with_balances(store: &dyn Storage) {
    let opened = day(2020, 1, 10);
    let dates: Vec<Date> = (0..10).map(|i| opened + Duration::days(i)).collect();
    let (a, balances) = insert_with_balances(store, new_account("A", "JPY", opened, None), &dates);

    let wider = new_account("B", "GBP", opened - Duration::days(1), Some(opened + Duration::days(200)));
    let updated = store.update_account(&a, &wider).unwrap();
    assert_eq!(updated.account, wider);

    let narrower = new_account("C", "GBP", opened, Some(opened + Duration::days(5)));
    assert!(matches!(
        store.update_account(&updated, &narrower),
        Err(StorageError::UpdateInvalidatesBalance { account_id, .. }) if account_id == a.id
    ));
    let late_open = new_account("C", "GBP", opened + Duration::days(1), None);
    assert!(matches!(
        store.update_account(&updated, &late_open),
        Err(StorageError::UpdateInvalidatesBalance { balance_id, .. }) if balance_id == balances[0].id
    ));
    assert_eq!(store.select_account(a.id).unwrap(), updated);
}

pub fn refuses_invalid_account_updates(store: &dyn Storage) {
    let a = store.insert_account(&new_account("A", "GBP", day(2020, 1, 1), None)).unwrap();

    let mut nameless = a.account.clone();
    nameless.name = " ".to_string();
    assert!(matches!(store.update_account(&a, &nameless), Err(StorageError::InvalidField(_))));

    let mut stale = a.clone();
    stale.account.name = "Stale".to_string();
    let changes = new_account("New", "GBP", day(2020, 1, 1), None);
    assert!(matches!(
        store.update_account(&stale, &changes),
        Err(StorageError::AccountDifferentInStoreAndRuntime(_))
    ));
    assert_eq!(store.select_account(a.id).unwrap(), a);
}

pub fn closes(store: &dyn Storage) {
    assert!(store.available());
    store.close().unwrap();
    assert!(!store.available());
    assert!(matches!(store.select_accounts(), Err(StorageError::Closed)));
    store.close().unwrap();
}

#[macro_export]
macro_rules! storage_conformance_tests {
    ($make:expr $(, #[$attr:meta])*) => {
        #[test] $(#[$attr])*
        fn inserts_and_selects_accounts() { $crate::conformance::inserts_and_selects_accounts(&$make); }
        #[test] $(#[$attr])*
        fn insert_assigns_id_and_keeps_fields() { $crate::conformance::insert_assigns_id_and_keeps_fields(&$make); }
        #[test] $(#[$attr])*
        fn rejects_invalid_accounts() { $crate::conformance::rejects_invalid_accounts(&$make); }
        #[test] $(#[$attr])*
        fn missing_account_is_not_found() { $crate::conformance::missing_account_is_not_found(&$make); }
        #[test] $(#[$attr])*
        fn selects_open_accounts() { $crate::conformance::selects_open_accounts(&$make); }
        #[test] $(#[$attr])*
        fn validates_accounts() { $crate::conformance::validates_accounts(&$make); }
        #[test] $(#[$attr])*
        fn soft_deletes_accounts() { $crate::conformance::soft_deletes_accounts(&$make); }
        #[test] $(#[$attr])*
        fn inserts_balances_within_range() { $crate::conformance::inserts_balances_within_range(&$make); }
        #[test] $(#[$attr])*
        fn orders_balances_by_date_then_id() { $crate::conformance::orders_balances_by_date_then_id(&$make); }
        #[test] $(#[$attr])*
        fn validates_balance_ownership() { $crate::conformance::validates_balance_ownership(&$make); }
        #[test] $(#[$attr])*
        fn selects_balance_by_id_for_owner_only() { $crate::conformance::selects_balance_by_id_for_owner_only(&$make); }
        #[test] $(#[$attr])*
        fn balance_at_date_prefers_latest_date_then_highest_id() {
            $crate::conformance::balance_at_date_prefers_latest_date_then_highest_id(&$make);
        }
        #[test] $(#[$attr])*
        fn updates_balances() { $crate::conformance::updates_balances(&$make); }
        #[test] $(#[$attr])*
        fn updates_accounts_without_balances() { $crate::conformance::updates_accounts_without_balances(&$make); }
        #[test] $(#[$attr])*
        fn updates_accounts_with_balances() { $crate::conformance::updates_accounts_with_balances(&$make); }
        #[test] $(#[$attr])*
        fn refuses_invalid_account_updates() { $crate::conformance::refuses_invalid_account_updates(&$make); }
        #[test] $(#[$attr])*
        fn closes() { $crate::conformance::closes(&$make); }
    };
}
