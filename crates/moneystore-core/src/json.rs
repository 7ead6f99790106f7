//! JSON interchange for stored accounts and balances.
//!
//! The wire shape is fixed by [`AccountJson`] and [`BalanceJson`] rather than
//! by the layout of the model types. The delete timestamp is never written.

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

use crate::{
    columns::serde_date,
    models::{
        stored::{AccountId, BalanceId, StoredAccount, StoredBalance},
        Account, Balance, CurrencyCode, FieldError, Money,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountJson {
    pub id: AccountId,
    pub name: String,
    #[serde(with = "serde_date")]
    pub start: Date,
    #[serde(with = "serde_date::option", default)]
    pub end: Option<Date>,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceJson {
    pub id: BalanceId,
    #[serde(with = "serde_date")]
    pub date: Date,
    pub money: Money,
}

impl From<&StoredAccount> for AccountJson {
    fn from(a: &StoredAccount) -> Self {
        Self {
            id: a.id,
            name: a.account.name.clone(),
            start: a.account.opened,
            end: a.account.closed,
            currency: a.account.currency,
        }
    }
}

impl TryFrom<AccountJson> for StoredAccount {
    type Error = FieldError;

    fn try_from(j: AccountJson) -> Result<Self, Self::Error> {
        let account = Account {
            name: j.name,
            currency: j.currency,
            opened: j.start,
            closed: j.end,
        };
        account.validate()?;
        Ok(StoredAccount::new(j.id, account))
    }
}

impl From<&StoredBalance> for BalanceJson {
    fn from(b: &StoredBalance) -> Self {
        Self {
            id: b.id,
            date: b.balance.date,
            money: b.balance.money,
        }
    }
}

impl From<BalanceJson> for StoredBalance {
    fn from(j: BalanceJson) -> Self {
        StoredBalance::new(j.id, Balance::new(j.date, j.money))
    }
}

impl Serialize for StoredAccount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AccountJson::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StoredAccount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let helper = AccountJson::deserialize(deserializer)?;
        StoredAccount::try_from(helper).map_err(D::Error::custom)
    }
}

impl Serialize for StoredBalance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BalanceJson::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StoredBalance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BalanceJson::deserialize(deserializer).map(StoredBalance::from)
    }
}

pub fn account_to_json(account: &StoredAccount) -> Result<String, serde_json::Error> {
    serde_json::to_string(account)
}

pub fn account_from_json(json: &str) -> Result<StoredAccount, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn balance_to_json(balance: &StoredBalance) -> Result<String, serde_json::Error> {
    serde_json::to_string(balance)
}

pub fn balance_from_json(json: &str) -> Result<StoredBalance, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::{Month, OffsetDateTime};

    fn day(y: i32, m: Month, d: u8) -> Date {
        Date::from_calendar_date(y, m, d).unwrap()
    }

    fn account() -> StoredAccount {
        let inner = Account::new("Joint", CurrencyCode::new("GBP").unwrap(), day(2000, Month::January, 1))
            .unwrap()
            .with_closed(day(2001, Month::January, 1))
            .unwrap();
        StoredAccount::new(12, inner)
    }

    #[test]
    fn account_wire_shape() {
        let value = serde_json::to_value(account()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 12,
                "name": "Joint",
                "start": "2000-01-01",
                "end": "2001-01-01",
                "currency": "GBP"
            })
        );
    }

    #[test]
    fn account_round_trip_drops_delete_timestamp() {
        let mut a = account();
        a.mark_deleted(OffsetDateTime::UNIX_EPOCH);
        let back = account_from_json(&account_to_json(&a).unwrap()).unwrap();
        assert_eq!(back.id, a.id);
        assert_eq!(back.account, a.account);
        assert_eq!(back.deleted_at, None);
    }

    #[test]
    fn open_account_end_may_be_null_or_absent() {
        let with_null = r#"{"id":1,"name":"A","start":"2010-05-05","end":null,"currency":"eur"}"#;
        let absent = r#"{"id":1,"name":"A","start":"2010-05-05","currency":"EUR"}"#;
        let a = account_from_json(with_null).unwrap();
        let b = account_from_json(absent).unwrap();
        assert_eq!(a, b);
        assert!(a.is_open());
    }

    #[test]
    fn invalid_account_json_is_rejected() {
        let empty_name = r#"{"id":1,"name":"","start":"2010-05-05","currency":"EUR"}"#;
        let reversed = r#"{"id":1,"name":"A","start":"2010-05-05","end":"2010-05-04","currency":"EUR"}"#;
        let bad_currency = r#"{"id":1,"name":"A","start":"2010-05-05","currency":"EURO"}"#;
        assert!(account_from_json(empty_name).is_err());
        assert!(account_from_json(reversed).is_err());
        assert!(account_from_json(bad_currency).is_err());
    }

    #[test]
    fn balance_round_trip() {
        let b = StoredBalance::new(
            3,
            Balance::new(day(2020, Month::July, 9), Money::new(-1999, CurrencyCode::new("USD").unwrap())),
        );
        let json = balance_to_json(&b).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).unwrap(),
            json!({"id": 3, "date": "2020-07-09", "money": {"amount": -1999, "currency": "USD"}})
        );
        assert_eq!(balance_from_json(&json).unwrap(), b);
    }
}
