//! Daily interest computation.
//!
//! Interest is computed in exact decimal arithmetic and rounded toward negative infinity
//! to whole minor units:
//!
//! ```text
//! interest = floor(balance * annual_rate / days_in_year)
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};

/// Default annual rate: 27.5%.
pub const DEFAULT_ANNUAL_RATE: Decimal = Decimal::from_parts(275, 0, 0, false, 3);

/// Default day count used to derive the daily rate.
pub const DEFAULT_DAYS_IN_YEAR: u32 = 365;

/// Rate parameters for the accrual job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestPolicy {
    /// Annual rate as a fraction (0.275 = 27.5%).
    pub annual_rate: Decimal,
    /// Days the annual rate is spread over.
    pub days_in_year: u32,
}

impl InterestPolicy {
    /// Build a policy.
    ///
    /// # Errors
    ///
    /// `Validation` if the rate is negative or `days_in_year` is zero.
    pub fn new(annual_rate: Decimal, days_in_year: u32) -> Result<Self> {
        if annual_rate.is_sign_negative() {
            return Err(LedgerError::Validation(format!(
                "annual rate must not be negative, got {annual_rate}"
            )));
        }
        if days_in_year == 0 {
            return Err(LedgerError::Validation(
                "days in year must be positive".into(),
            ));
        }
        Ok(Self {
            annual_rate,
            days_in_year,
        })
    }

    /// Interest earned by `balance` over one day, floored to whole minor units.
    ///
    /// Negative balances produce non-positive interest, which the accrual job skips.
    ///
    /// # Errors
    ///
    /// `Validation` if the intermediate product overflows or `days_in_year` is zero.
    pub fn daily_interest(&self, balance: i64) -> Result<i64> {
        let overflow = || LedgerError::Validation(format!("interest overflow for balance {balance}"));

        let yearly = Decimal::from(balance)
            .checked_mul(self.annual_rate)
            .ok_or_else(overflow)?;
        let daily = yearly
            .checked_div(Decimal::from(self.days_in_year))
            .ok_or_else(overflow)?;

        daily.floor().to_i64().ok_or_else(overflow)
    }
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            annual_rate: DEFAULT_ANNUAL_RATE,
            days_in_year: DEFAULT_DAYS_IN_YEAR,
        }
    }
}
