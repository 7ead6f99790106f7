//! Consistency checks shared by every backend.
//!
//! Backends fetch the persisted state and hand it to these functions inside
//! the same transaction as the mutation that follows.

use time::Date;

use crate::{
    models::{
        stored::{AccountId, StoredAccount, StoredBalance},
        Account, Balance,
    },
    storage::StorageError,
};

/// Compares the runtime copy of an account with the row read from the store.
pub fn check_account(runtime: &StoredAccount, persisted: Option<&StoredAccount>) -> Result<(), StorageError> {
    let persisted = persisted.ok_or(StorageError::AccountNotFound(runtime.id))?;
    if persisted.account != runtime.account || persisted.deleted_at != runtime.deleted_at {
        return Err(StorageError::AccountDifferentInStoreAndRuntime(runtime.id));
    }
    if persisted.is_deleted() {
        return Err(StorageError::AccountDeleted(runtime.id));
    }
    Ok(())
}

pub fn check_balance_range(account: &StoredAccount, balance: &Balance) -> Result<(), StorageError> {
    balance.validate()?;
    account.validate_balance(balance)?;
    Ok(())
}

/// Range check followed, for persisted balances only, by an ownership check
/// against the balances the store holds for the account.
pub fn check_balance(account: &StoredAccount, balance: &StoredBalance, owned: &[StoredBalance]) -> Result<(), StorageError> {
    check_balance_range(account, &balance.balance)?;
    if balance.is_persisted() && !owned.iter().any(|b| b.id == balance.id) {
        return Err(StorageError::InvalidAccountBalance {
            account_id: account.id,
            balance_id: balance.id,
        });
    }
    Ok(())
}

/// Ownership check for a balance about to be rewritten. Unlike
/// [`check_balance`], an unsaved balance is refused.
pub fn check_stored_balance(
    account: &StoredAccount,
    balance: &StoredBalance,
    owned: &[StoredBalance],
) -> Result<(), StorageError> {
    if !balance.is_persisted() {
        return Err(StorageError::InvalidAccountBalance {
            account_id: account.id,
            balance_id: balance.id,
        });
    }
    check_balance(account, balance, owned)
}

/// Every existing balance must stay inside the range of the updated account.
pub fn check_update_keeps_balances(
    account_id: AccountId,
    changes: &Account,
    balances: &[StoredBalance],
) -> Result<(), StorageError> {
    match balances.iter().find(|b| changes.validate_balance(&b.balance).is_err()) {
        Some(b) => Err(StorageError::UpdateInvalidatesBalance {
            account_id,
            balance_id: b.id,
            date: b.date(),
        }),
        None => Ok(()),
    }
}

/// The balance with the latest date not after `date`; equal dates go to the
/// highest id.
pub fn latest_balance_at<'a, I>(balances: I, date: Date) -> Result<StoredBalance, StorageError>
where
    I: IntoIterator<Item = &'a StoredBalance>,
{
    balances
        .into_iter()
        .filter(|b| b.date() <= date)
        .max_by_key(|b| (b.date(), b.id))
        .copied()
        .ok_or(StorageError::NoBalances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{stored::UNASSIGNED_ID, CurrencyCode, Money};
    use time::{Month, OffsetDateTime};

    fn day(d: u8) -> Date {
        Date::from_calendar_date(2022, Month::January, d).unwrap()
    }

    fn account() -> StoredAccount {
        let inner = Account::new("Current", CurrencyCode::new("GBP").unwrap(), day(1))
            .unwrap()
            .with_closed(day(20))
            .unwrap();
        StoredAccount::new(4, inner)
    }

    fn balance(id: u64, d: u8) -> StoredBalance {
        StoredBalance::new(id, Balance::new(day(d), Money::new(i64::from(d) * 100, CurrencyCode::new("GBP").unwrap())))
    }

    #[test]
    fn missing_row_is_not_found() {
        assert!(matches!(check_account(&account(), None), Err(StorageError::AccountNotFound(4))));
    }

    #[test]
    fn divergent_row_is_reported() {
        let runtime = account();
        let mut persisted = runtime.clone();
        persisted.account.name = "Renamed".to_string();
        assert!(matches!(
            check_account(&runtime, Some(&persisted)),
            Err(StorageError::AccountDifferentInStoreAndRuntime(4))
        ));

        let mut deleted = runtime.clone();
        deleted.mark_deleted(OffsetDateTime::UNIX_EPOCH);
        assert!(matches!(
            check_account(&runtime, Some(&deleted)),
            Err(StorageError::AccountDifferentInStoreAndRuntime(4))
        ));
    }

    #[test]
    fn deleted_row_is_reported_when_copies_agree() {
        let mut runtime = account();
        runtime.mark_deleted(OffsetDateTime::UNIX_EPOCH);
        let persisted = runtime.clone();
        assert!(matches!(check_account(&runtime, Some(&persisted)), Err(StorageError::AccountDeleted(4))));
    }

    #[test]
    fn matching_row_passes_repeatedly() {
        let runtime = account();
        let persisted = runtime.clone();
        assert!(check_account(&runtime, Some(&persisted)).is_ok());
        assert!(check_account(&runtime, Some(&persisted)).is_ok());
    }

    #[test]
    fn unsaved_balance_cannot_be_rewritten() {
        let a = account();
        let owned = [balance(1, 2)];
        let unsaved = balance(UNASSIGNED_ID, 3);
        assert!(check_balance(&a, &unsaved, &owned).is_ok());
        assert!(matches!(
            check_stored_balance(&a, &unsaved, &owned),
            Err(StorageError::InvalidAccountBalance { account_id: 4, balance_id: 0 })
        ));
        assert!(check_stored_balance(&a, &owned[0], &owned).is_ok());
    }

    #[test]
    fn balance_checks_range_before_ownership() {
        let a = account();
        let owned = [balance(1, 2), balance(2, 3)];

        assert!(check_balance(&a, &owned[0], &owned).is_ok());
        assert!(check_balance(&a, &balance(UNASSIGNED_ID, 5), &owned).is_ok());
        assert!(matches!(
            check_balance(&a, &balance(9, 5), &owned),
            Err(StorageError::InvalidAccountBalance { account_id: 4, balance_id: 9 })
        ));
        assert!(matches!(
            check_balance(&a, &balance(9, 25), &owned),
            Err(StorageError::DateOutOfAccountTimeRange(_))
        ));
    }

    #[test]
    fn update_must_keep_balances_in_range() {
        let a = account();
        let balances = [balance(1, 2), balance(2, 10)];

        let wider = Account::new("Current", a.currency(), day(1)).unwrap();
        assert!(check_update_keeps_balances(a.id, &wider, &balances).is_ok());

        let narrower = wider.clone().with_closed(day(5)).unwrap();
        assert!(matches!(
            check_update_keeps_balances(a.id, &narrower, &balances),
            Err(StorageError::UpdateInvalidatesBalance { account_id: 4, balance_id: 2, .. })
        ));
    }

    #[test]
    fn latest_balance_breaks_ties_by_id() {
        let balances = [balance(1, 1), balance(2, 3), balance(3, 5), balance(4, 5), balance(5, 7)];
        assert_eq!(latest_balance_at(&balances, day(6)).unwrap().id, 4);
        assert_eq!(latest_balance_at(&balances, day(7)).unwrap().id, 5);
        assert_eq!(latest_balance_at(&balances, day(2)).unwrap().id, 1);
        assert!(matches!(
            latest_balance_at(&balances[1..], day(1)),
            Err(StorageError::NoBalances)
        ));
    }
}
