use time::{Date, Duration, OffsetDateTime};

use super::{Account, Balance, CurrencyCode, DateOutOfRange, Money};

pub type AccountId = u64;
pub type BalanceId = u64;

/// Id carried by a balance that has not been persisted yet.
pub const UNASSIGNED_ID: BalanceId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountState {
    Active,
    Deleted,
}

/// An account as held by a store: the domain value plus the store's id and
/// soft delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredAccount {
    pub id: AccountId,
    pub account: Account,
    pub deleted_at: Option<OffsetDateTime>,
}

impl StoredAccount {
    pub fn new(id: AccountId, account: Account) -> Self {
        Self {
            id,
            account,
            deleted_at: None,
        }
    }

    pub fn state(&self) -> AccountState {
        match self.deleted_at {
            Some(_) => AccountState::Deleted,
            None => AccountState::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == AccountState::Deleted
    }

    pub fn mark_deleted(&mut self, at: OffsetDateTime) {
        self.deleted_at = Some(at);
    }

    pub fn name(&self) -> &str {
        &self.account.name
    }

    pub fn currency(&self) -> CurrencyCode {
        self.account.currency
    }

    pub fn opened(&self) -> Date {
        self.account.opened
    }

    pub fn closed(&self) -> Option<Date> {
        self.account.closed
    }

    pub fn is_open(&self) -> bool {
        self.account.is_open()
    }

    pub fn validate_balance(&self, balance: &Balance) -> Result<(), DateOutOfRange> {
        self.account.validate_balance(balance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoredBalance {
    pub id: BalanceId,
    pub balance: Balance,
}

impl StoredBalance {
    pub fn new(id: BalanceId, balance: Balance) -> Self {
        Self { id, balance }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }

    pub fn date(&self) -> Date {
        self.balance.date
    }

    pub fn money(&self) -> Money {
        self.balance.money
    }
}

/// Current time at whole second precision, the resolution at which stores
/// keep delete timestamps.
pub fn deletion_timestamp() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn deleting_changes_state() {
        let opened = Date::from_calendar_date(2021, Month::June, 1).unwrap();
        let account = Account::new("Wallet", CurrencyCode::new("EUR").unwrap(), opened).unwrap();
        let mut stored = StoredAccount::new(7, account);
        assert_eq!(stored.state(), AccountState::Active);

        let at = deletion_timestamp();
        stored.mark_deleted(at);
        assert_eq!(stored.state(), AccountState::Deleted);
        assert_eq!(stored.deleted_at, Some(at));
        assert_eq!(at.nanosecond(), 0);
    }

    #[test]
    fn unassigned_balance_is_not_persisted() {
        let date = Date::from_calendar_date(2021, Month::June, 1).unwrap();
        let b = Balance::new(date, Money::new(10, CurrencyCode::new("EUR").unwrap()));
        assert!(!StoredBalance::new(UNASSIGNED_ID, b).is_persisted());
        assert!(StoredBalance::new(3, b).is_persisted());
    }
}
