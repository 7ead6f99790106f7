//! Copies accounts and their balances from one store into another.
//!
//! Deleted accounts are not copied. Every copied account is read back from
//! the target and compared with its source before the report is returned.

use std::{collections::BTreeMap, fmt::Display};

use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use moneystore_core::{
    AccountId, Balance, CurrencyCode, Money, Storage, StorageError, StoredAccount, StoredBalance,
};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountMigration {
    pub source_id: AccountId,
    pub target_id: AccountId,
    pub name: String,
    pub balances: usize,
    /// Latest balance in the target, if the account has any.
    pub latest: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub accounts: Vec<AccountMigration>,
}

impl MigrationReport {
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn balance_count(&self) -> usize {
        self.accounts.iter().map(|a| a.balances).sum()
    }

    pub fn target_id(&self, source_id: AccountId) -> Option<AccountId> {
        self.accounts
            .iter()
            .find(|a| a.source_id == source_id)
            .map(|a| a.target_id)
    }

    /// Sum of the latest balances, per currency.
    pub fn totals(&self) -> BTreeMap<CurrencyCode, Decimal> {
        let mut totals = BTreeMap::new();
        for money in self.accounts.iter().filter_map(|a| a.latest) {
            *totals.entry(money.currency()).or_insert(Decimal::ZERO) += money.to_decimal();
        }
        totals
    }
}

impl Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Source", "Target", "Account", "Balances", "Latest"]);
        table.add_empty_row();

        for item in &self.accounts {
            let latest = item.latest.map(|m| m.to_string()).unwrap_or_default();
            table.add_row(row![item.source_id, item.target_id, item.name, item.balances, latest]);
        }

        let totals = self.totals();
        if !totals.is_empty() {
            table.add_empty_row();
            for (currency, total) in totals {
                table.add_row(row!["", "", "Total", "", format!("{} {}", total, currency)]);
            }
        }

        write!(f, "\n{}\n", table)
    }
}

/// Copies every open or closed, non-deleted account in `source` into `target`.
pub fn migrate(source: &dyn Storage, target: &dyn Storage) -> Result<MigrationReport, Error> {
    if !source.available() {
        return Err(Error::Unavailable("source"));
    }
    if !target.available() {
        return Err(Error::Unavailable("target"));
    }

    let accounts = source.select_accounts()?;
    tracing::info!(accounts = accounts.len(), "Migrating accounts");

    let mut report = MigrationReport::default();
    for account in &accounts {
        let balances = source.select_account_balances(account)?;
        let copied = target.insert_account(&account.account)?;
        for balance in &balances {
            target.insert_balance(&copied, &balance.balance)?;
        }
        tracing::debug!(
            source_id = account.id,
            target_id = copied.id,
            balances = balances.len(),
            "Account copied"
        );

        verify(account, &balances, target, &copied)?;
        report.accounts.push(AccountMigration {
            source_id: account.id,
            target_id: copied.id,
            name: account.name().to_string(),
            balances: balances.len(),
            latest: latest_balance(target, &copied, &balances)?,
        });
    }

    tracing::info!(
        accounts = report.account_count(),
        balances = report.balance_count(),
        "Migration finished"
    );
    Ok(report)
}

fn verify(
    original: &StoredAccount,
    balances: &[StoredBalance],
    target: &dyn Storage,
    copied: &StoredAccount,
) -> Result<(), Error> {
    let mismatch = |reason: String| {
        tracing::warn!(source_id = original.id, target_id = copied.id, %reason, "Migration check failed");
        Error::Verification {
            source_id: original.id,
            target_id: copied.id,
            reason,
        }
    };

    let persisted = target.select_account(copied.id)?;
    if persisted.account != original.account {
        return Err(mismatch(format!(
            "account {:?} became {:?}",
            original.account, persisted.account
        )));
    }

    let expected: Vec<Balance> = balances.iter().map(|b| b.balance).collect();
    let actual: Vec<Balance> = target
        .select_account_balances(&persisted)?
        .into_iter()
        .map(|b| b.balance)
        .collect();
    if expected != actual {
        return Err(mismatch(format!(
            "expected {} balances, found {}",
            expected.len(),
            actual.len()
        )));
    }
    Ok(())
}

fn latest_balance(
    target: &dyn Storage,
    copied: &StoredAccount,
    balances: &[StoredBalance],
) -> Result<Option<Money>, Error> {
    let Some(last) = balances.iter().map(StoredBalance::date).max() else {
        return Ok(None);
    };
    match target.balance_at_date(copied, last) {
        Ok(balance) => Ok(Some(balance.money())),
        Err(StorageError::NoBalances) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
