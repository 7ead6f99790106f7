//! In-memory storage backend for moneystore.
//!
//! All state lives behind one `RwLock`; every validate-then-mutate sequence
//! holds the write lock throughout.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use time::Date;

use moneystore_core::{
    deletion_timestamp, validation, Account, AccountId, Balance, BalanceId, Storage, StorageError,
    StoredAccount, StoredBalance,
};

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountId, StoredAccount>,
    balances: BTreeMap<BalanceId, (AccountId, Balance)>,
}

impl State {
    fn balances_for(&self, account_id: AccountId) -> Vec<StoredBalance> {
        let mut balances: Vec<StoredBalance> = self
            .balances
            .iter()
            .filter(|(_, (owner, _))| *owner == account_id)
            .map(|(id, (_, b))| StoredBalance::new(*id, *b))
            .collect();
        balances.sort_by_key(|b| (b.date(), b.id));
        balances
    }

    fn check_account(&self, account: &StoredAccount) -> Result<(), StorageError> {
        validation::check_account(account, self.accounts.get(&account.id))
    }
}

pub struct InMemoryStorage {
    state: RwLock<State>,
    account_counter: AtomicU64,
    balance_counter: AtomicU64,
    closed: AtomicBool,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            account_counter: AtomicU64::new(1),
            balance_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        self.state
            .read()
            .map_err(|_| StorageError::Other("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        self.state
            .write()
            .map_err(|_| StorageError::Other("memory store lock poisoned".to_string()))
    }
}

impl Storage for InMemoryStorage {
    fn available(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn insert_account(&self, account: &Account) -> Result<StoredAccount, StorageError> {
        account.validate()?;
        let mut state = self.write()?;
        let id = self.account_counter.fetch_add(1, Ordering::SeqCst);
        let stored = StoredAccount::new(id, account.clone());
        state.accounts.insert(id, stored.clone());
        tracing::debug!(account_id = id, "Account inserted");
        Ok(stored)
    }

    fn select_account(&self, id: AccountId) -> Result<StoredAccount, StorageError> {
        self.read()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StorageError::AccountNotFound(id))
    }

    fn select_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect())
    }

    fn select_open_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .filter(|a| !a.is_deleted() && a.is_open())
            .cloned()
            .collect())
    }

    fn validate_account(&self, account: &StoredAccount) -> Result<(), StorageError> {
        self.read()?.check_account(account)
    }

    fn update_account(&self, original: &StoredAccount, changes: &Account) -> Result<StoredAccount, StorageError> {
        let mut state = self.write()?;
        state.check_account(original)?;
        changes.validate()?;
        validation::check_update_keeps_balances(original.id, changes, &state.balances_for(original.id))?;

        let updated = StoredAccount::new(original.id, changes.clone());
        state.accounts.insert(original.id, updated.clone());
        tracing::debug!(account_id = original.id, "Account updated");
        Ok(updated)
    }

    fn delete_account(&self, account: &mut StoredAccount) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state.check_account(account)?;

        let at = deletion_timestamp();
        if let Some(row) = state.accounts.get_mut(&account.id) {
            row.mark_deleted(at);
        }
        account.mark_deleted(at);
        tracing::debug!(account_id = account.id, "Account soft deleted");
        Ok(())
    }

    fn insert_balance(&self, account: &StoredAccount, balance: &Balance) -> Result<StoredBalance, StorageError> {
        let mut state = self.write()?;
        state.check_account(account)?;
        validation::check_balance_range(account, balance)?;

        let id = self.balance_counter.fetch_add(1, Ordering::SeqCst);
        state.balances.insert(id, (account.id, *balance));
        tracing::debug!(account_id = account.id, balance_id = id, "Balance inserted");
        Ok(StoredBalance::new(id, *balance))
    }

    fn select_account_balances(&self, account: &StoredAccount) -> Result<Vec<StoredBalance>, StorageError> {
        Ok(self.read()?.balances_for(account.id))
    }

    fn select_balance(&self, account: &StoredAccount, id: BalanceId) -> Result<StoredBalance, StorageError> {
        match self.read()?.balances.get(&id) {
            Some((owner, b)) if *owner == account.id => Ok(StoredBalance::new(id, *b)),
            _ => Err(StorageError::BalanceNotFound {
                account_id: account.id,
                balance_id: id,
            }),
        }
    }

    fn validate_balance(&self, account: &StoredAccount, balance: &StoredBalance) -> Result<(), StorageError> {
        let state = self.read()?;
        validation::check_balance(account, balance, &state.balances_for(account.id))
    }

    fn update_balance(
        &self,
        account: &StoredAccount,
        original: &StoredBalance,
        changes: &Balance,
    ) -> Result<StoredBalance, StorageError> {
        let mut state = self.write()?;
        state.check_account(account)?;
        validation::check_stored_balance(account, original, &state.balances_for(account.id))?;
        validation::check_balance_range(account, changes)?;

        state.balances.insert(original.id, (account.id, *changes));
        tracing::debug!(account_id = account.id, balance_id = original.id, "Balance updated");
        Ok(StoredBalance::new(original.id, *changes))
    }

    fn balance_at_date(&self, account: &StoredAccount, date: Date) -> Result<StoredBalance, StorageError> {
        let state = self.read()?;
        validation::latest_balance_at(&state.balances_for(account.id), date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneystore_core::conformance::{day, new_account, new_balance};

    moneystore_core::storage_conformance_tests!(InMemoryStorage::new());

    #[test]
    fn ids_are_not_reused_across_accounts() {
        let store = InMemoryStorage::new();
        let a = store.insert_account(&new_account("A", "GBP", day(2020, 1, 1), None)).unwrap();
        let b = store.insert_account(&new_account("B", "GBP", day(2020, 1, 1), None)).unwrap();
        let ba = store.insert_balance(&a, &new_balance(day(2020, 1, 2), 1)).unwrap();
        let bb = store.insert_balance(&b, &new_balance(day(2020, 1, 2), 1)).unwrap();
        assert_ne!(ba.id, bb.id);
    }
}
