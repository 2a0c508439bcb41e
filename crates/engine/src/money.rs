use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ResultEngine};

/// Signed money amount represented as integer **minor units** of some
/// [`Currency`] (cents, kopecks).
///
/// Use this type for **all** monetary values in the engine (balances, deltas,
/// converted amounts) to avoid floating-point drift. The currency is carried
/// next to the value, never inside it, so conversions to and from decimals take
/// the currency explicitly.
///
/// Arithmetic goes through the `checked_*` methods only.
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
/// use rust_decimal::Decimal;
///
/// let amount = Money::from_decimal(Decimal::new(1234, 2), Currency::Usd).unwrap();
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_decimal(Currency::Usd).to_string(), "12.34");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Checked negation (returns `None` for `i64::MIN`).
    #[must_use]
    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Converts a major-unit decimal (e.g. `10.50`) into minor units.
    ///
    /// Rejects values with more fractional digits than the currency allows and
    /// values that do not fit in `i64` minor units.
    pub fn from_decimal(value: Decimal, currency: Currency) -> ResultEngine<Money> {
        let scaled = value
            .checked_mul(minor_factor(currency))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
        if !scaled.fract().is_zero() {
            return Err(EngineError::InvalidAmount(format!(
                "too many decimals for {currency}: at most {} allowed",
                currency.minor_units()
            )));
        }
        scaled
            .to_i64()
            .map(Money)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Converts a major-unit decimal into minor units, truncating extra
    /// fractional digits toward zero.
    pub fn truncated(value: Decimal, currency: Currency) -> ResultEngine<Money> {
        value
            .checked_mul(minor_factor(currency))
            .and_then(|scaled| scaled.trunc().to_i64())
            .map(Money)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Returns the amount in major units of `currency`.
    #[must_use]
    pub fn to_decimal(self, currency: Currency) -> Decimal {
        Decimal::new(self.0, currency.minor_units())
    }
}

fn minor_factor(currency: Currency) -> Decimal {
    Decimal::from(10i64.pow(currency.minor_units()))
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}
