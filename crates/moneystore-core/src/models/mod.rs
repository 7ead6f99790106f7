use std::fmt::Display;

use thiserror::Error;
use time::Date;

pub mod money;
pub mod stored;

pub use money::{CurrencyCode, Money};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("account name is empty")]
    EmptyName,
    #[error("close date {closed} is before open date {opened}")]
    ClosedBeforeOpened { opened: Date, closed: Date },
    #[error("invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),
    #[error("invalid money amount: {0}")]
    InvalidAmount(String),
    #[error("date {0} is outside years 0..=9999")]
    UnsupportedYear(Date),
}

/// Dates are stored as `YYYY-MM-DD` text, which only sorts correctly for
/// four digit, non-negative years.
pub const MIN_YEAR: i32 = 0;
pub const MAX_YEAR: i32 = 9999;

fn check_year(date: Date) -> Result<(), FieldError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(())
    } else {
        Err(FieldError::UnsupportedYear(date))
    }
}

/// Half open range of days `[start, end)`. A missing end never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: Date,
    pub end: Option<Date>,
}

impl TimeRange {
    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && self.end.map_or(true, |end| date < end)
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, ..)", self.start),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("date {date} is outside account time range {range}")]
pub struct DateOutOfRange {
    pub date: Date,
    pub range: TimeRange,
}

/// A named ledger that is valid from the day it was opened until the day it
/// was closed, if ever.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account {
    pub name: String,
    pub currency: CurrencyCode,
    pub opened: Date,
    pub closed: Option<Date>,
}

impl Account {
    pub fn new(name: impl Into<String>, currency: CurrencyCode, opened: Date) -> Result<Self, FieldError> {
        let account = Self {
            name: name.into(),
            currency,
            opened,
            closed: None,
        };
        account.validate()?;
        Ok(account)
    }

    pub fn with_closed(mut self, closed: Date) -> Result<Self, FieldError> {
        self.closed = Some(closed);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        if self.name.trim().is_empty() {
            return Err(FieldError::EmptyName);
        }
        check_year(self.opened)?;
        if let Some(closed) = self.closed {
            check_year(closed)?;
        }
        if let Some(closed) = self.closed {
            if closed < self.opened {
                return Err(FieldError::ClosedBeforeOpened {
                    opened: self.opened,
                    closed,
                });
            }
        }
        Ok(())
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.opened,
            end: self.closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    /// Checks that the balance date falls inside the account's time range.
    pub fn validate_balance(&self, balance: &Balance) -> Result<(), DateOutOfRange> {
        let range = self.time_range();
        if range.contains(balance.date) {
            Ok(())
        } else {
            Err(DateOutOfRange {
                date: balance.date,
                range,
            })
        }
    }
}

/// The amount held by an account on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Balance {
    pub date: Date,
    pub money: Money,
}

impl Balance {
    pub fn new(date: Date, money: Money) -> Self {
        Self { date, money }
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        check_year(self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn day(y: i32, m: Month, d: u8) -> Date {
        Date::from_calendar_date(y, m, d).unwrap()
    }

    fn gbp() -> CurrencyCode {
        CurrencyCode::new("GBP").unwrap()
    }

    #[test]
    fn account_requires_name() {
        let opened = day(2020, Month::March, 1);
        assert_eq!(Account::new("", gbp(), opened), Err(FieldError::EmptyName));
        assert_eq!(Account::new("  \t", gbp(), opened), Err(FieldError::EmptyName));
    }

    #[test]
    fn account_close_must_not_precede_open() {
        let opened = day(2020, Month::March, 2);
        let closed = day(2020, Month::March, 1);
        let err = Account::new("Current", gbp(), opened)
            .unwrap()
            .with_closed(closed)
            .unwrap_err();
        assert_eq!(err, FieldError::ClosedBeforeOpened { opened, closed });

        // Same day is allowed, the range is just empty.
        assert!(Account::new("Current", gbp(), opened).unwrap().with_closed(opened).is_ok());
    }

    #[test]
    fn balance_range_is_half_open() {
        let opened = day(2000, Month::January, 1);
        let closed = day(2001, Month::January, 1);
        let account = Account::new("TEST", gbp(), opened).unwrap().with_closed(closed).unwrap();
        let at = |d| Balance::new(d, Money::new(0, gbp()));

        assert!(account.validate_balance(&at(opened)).is_ok());
        assert!(account.validate_balance(&at(day(2000, Month::December, 31))).is_ok());
        assert!(account.validate_balance(&at(closed)).is_err());

        let before = opened.previous_day().unwrap();
        let err = account.validate_balance(&at(before)).unwrap_err();
        assert_eq!(err.date, before);
        assert_eq!(err.range.to_string(), "[2000-01-01, 2001-01-01)");
    }

    #[test]
    fn dates_need_four_digit_years() {
        let bc = day(-1, Month::June, 1);
        assert_eq!(Account::new("Old", gbp(), bc), Err(FieldError::UnsupportedYear(bc)));

        let opened = day(0, Month::January, 1);
        let account = Account::new("Year zero", gbp(), opened).unwrap();
        assert_eq!(
            account.clone().with_closed(day(9999, Month::December, 31)).map(|a| a.closed),
            Ok(Some(day(9999, Month::December, 31)))
        );

        let mut stale = account;
        stale.closed = Some(bc);
        assert_eq!(stale.validate(), Err(FieldError::UnsupportedYear(bc)));

        assert_eq!(
            Balance::new(bc, Money::new(1, gbp())).validate(),
            Err(FieldError::UnsupportedYear(bc))
        );
        assert!(Balance::new(opened, Money::new(1, gbp())).validate().is_ok());
    }

    #[test]
    fn open_account_accepts_far_future() {
        let account = Account::new("Savings", gbp(), day(2010, Month::May, 5)).unwrap();
        assert!(account.is_open());
        let b = Balance::new(day(2999, Month::December, 31), Money::new(1, gbp()));
        assert!(account.validate_balance(&b).is_ok());
    }
}
