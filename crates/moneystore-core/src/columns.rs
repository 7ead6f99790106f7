//! Column codecs shared by the SQL backends.
//!
//! Dates are stored as `YYYY-MM-DD` text, which orders the same way as the
//! dates it encodes. Delete timestamps are unix seconds and ids are the
//! driver's signed 64 bit integers.

use time::{Date, Month, OffsetDateTime};

use crate::{
    models::{
        stored::{StoredAccount, StoredBalance},
        Account, Balance, CurrencyCode, Money,
    },
    storage::StorageError,
};

/// Raw values of an `accounts` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub date_opened: String,
    pub date_closed: Option<String>,
    pub deleted_at: Option<i64>,
    pub currency: String,
}

impl AccountRow {
    pub fn into_stored(self) -> Result<StoredAccount, StorageError> {
        let account = Account {
            name: self.name,
            currency: CurrencyCode::new(&self.currency)?,
            opened: str_to_date(&self.date_opened)?,
            closed: self.date_closed.as_deref().map(str_to_date).transpose()?,
        };
        account.validate()?;
        Ok(StoredAccount {
            id: id_from_sql(self.id)?,
            account,
            deleted_at: self.deleted_at.map(secs_to_timestamp).transpose()?,
        })
    }
}

/// Raw values of a `balances` row, without the owning account id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    pub id: i64,
    pub date: String,
    pub balance: i64,
    pub currency: String,
}

impl BalanceRow {
    pub fn into_stored(self) -> Result<StoredBalance, StorageError> {
        let money = Money::new(self.balance, CurrencyCode::new(&self.currency)?);
        Ok(StoredBalance::new(
            id_from_sql(self.id)?,
            Balance::new(str_to_date(&self.date)?, money),
        ))
    }
}

pub fn id_to_sql(id: u64) -> Result<i64, StorageError> {
    i64::try_from(id).map_err(|_| StorageError::Other(format!("id out of range: {id}")))
}

pub fn id_from_sql(id: i64) -> Result<u64, StorageError> {
    u64::try_from(id).map_err(|_| StorageError::Other(format!("negative id in store: {id}")))
}

pub fn date_to_str(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

pub fn str_to_date(s: &str) -> Result<Date, StorageError> {
    let invalid = || StorageError::Other(format!("invalid date: {s:?}"));
    let mut parts = s.trim().splitn(3, '-');
    let mut next = || parts.next().ok_or_else(invalid);
    let year = next()?.parse::<i32>().map_err(|_| invalid())?;
    let month = next()?.parse::<u8>().map_err(|_| invalid())?;
    let day = next()?.parse::<u8>().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

pub fn timestamp_to_secs(t: OffsetDateTime) -> i64 {
    t.unix_timestamp()
}

pub fn secs_to_timestamp(secs: i64) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| StorageError::Other(format!("invalid timestamp {secs}: {e}")))
}

/// `serde(with = ...)` adapters over the text codec.
pub mod serde_date {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::date_to_str(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::str_to_date(&s).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{de::Error, Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.serialize_some(&crate::columns::date_to_str(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| crate::columns::str_to_date(&s).map_err(D::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_text_is_zero_padded() {
        let d = Date::from_calendar_date(987, Month::February, 3).unwrap();
        assert_eq!(date_to_str(d), "0987-02-03");
        assert_eq!(str_to_date("0987-02-03").unwrap(), d);
    }

    #[test]
    fn date_text_sorts_like_dates_across_supported_years() {
        let dates = [
            Date::from_calendar_date(0, Month::January, 1).unwrap(),
            Date::from_calendar_date(999, Month::December, 31).unwrap(),
            Date::from_calendar_date(2020, Month::May, 9).unwrap(),
            Date::from_calendar_date(9999, Month::December, 31).unwrap(),
        ];
        let text: Vec<String> = dates.iter().copied().map(date_to_str).collect();
        assert_eq!(text[0], "0000-01-01");
        assert!(text.windows(2).all(|w| w[0] < w[1]));
        for (d, t) in dates.iter().zip(&text) {
            assert_eq!(str_to_date(t).unwrap(), *d);
        }
    }

    #[test]
    fn malformed_dates_are_errors() {
        for bad in ["", "2020", "2020-13-01", "2020-02-30", "20x0-01-01"] {
            assert!(str_to_date(bad).is_err(), "{bad:?} parsed");
        }
    }

    #[test]
    fn account_row_maps_to_stored_account() {
        let row = AccountRow {
            id: 5,
            name: "Current".to_string(),
            date_opened: "2000-01-01".to_string(),
            date_closed: None,
            deleted_at: Some(1_600_000_000),
            currency: "gbp".to_string(),
        };
        let stored = row.into_stored().unwrap();
        assert_eq!(stored.id, 5);
        assert_eq!(stored.currency().as_str(), "GBP");
        assert!(stored.is_open());
        assert!(stored.is_deleted());
    }

    #[test]
    fn corrupt_account_row_is_an_error() {
        let row = AccountRow {
            id: 5,
            name: "Current".to_string(),
            date_opened: "2000-01-02".to_string(),
            date_closed: Some("2000-01-01".to_string()),
            deleted_at: None,
            currency: "GBP".to_string(),
        };
        assert!(matches!(row.into_stored(), Err(StorageError::InvalidField(_))));
    }

    #[test]
    fn balance_row_maps_to_stored_balance() {
        let row = BalanceRow {
            id: 9,
            date: "2020-07-09".to_string(),
            balance: -1999,
            currency: "USD".to_string(),
        };
        let stored = row.into_stored().unwrap();
        assert_eq!(stored.id, 9);
        assert_eq!(stored.money().amount(), -1999);
        assert_eq!(stored.date(), Date::from_calendar_date(2020, Month::July, 9).unwrap());
    }

    #[test]
    fn ids_must_fit_the_column() {
        assert_eq!(id_to_sql(42).unwrap(), 42);
        assert!(id_to_sql(u64::MAX).is_err());
        assert!(id_from_sql(-1).is_err());
    }

    #[test]
    fn timestamps_use_whole_seconds() {
        let t = secs_to_timestamp(1_600_000_000).unwrap();
        assert_eq!(timestamp_to_secs(t), 1_600_000_000);
    }
}
