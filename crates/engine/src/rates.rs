//! Exchange rates.
//!
//! Rates come from an external service behind [`RateProvider`]. The engine
//! never caches them: every exchange asks for a fresh rate.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{Currency, EngineError, ResultEngine};

/// `1 from = rate to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExchangeRate {
    pub from: Currency,
    pub to: Currency,
    rate: Decimal,
}

impl ExchangeRate {
    /// Fails with `RateUnavailable` unless `rate` is strictly positive.
    pub fn new(from: Currency, to: Currency, rate: Decimal) -> ResultEngine<Self> {
        if rate <= Decimal::ZERO {
            return Err(EngineError::RateUnavailable(format!(
                "non-positive rate {rate} for {from}->{to}"
            )));
        }
        Ok(Self { from, to, rate })
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.rate
    }
}

/// Snapshot of every known rate, expressed against one base currency:
/// `1 base = rates[c] c`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateTable {
    base: Currency,
    rates: BTreeMap<Currency, Decimal>,
}

impl RateTable {
    /// Build a table; the base currency is always present with rate 1.
    pub fn new(
        base: Currency,
        rates: impl IntoIterator<Item = (Currency, Decimal)>,
    ) -> ResultEngine<Self> {
        let mut table = BTreeMap::new();
        for (currency, rate) in rates {
            if rate <= Decimal::ZERO {
                return Err(EngineError::RateUnavailable(format!(
                    "non-positive rate {rate} for {currency}"
                )));
            }
            table.insert(currency, rate);
        }
        table.insert(base, Decimal::ONE);
        Ok(Self { base, rates: table })
    }

    #[must_use]
    pub fn base(&self) -> Currency {
        self.base
    }

    #[must_use]
    pub fn get(&self, currency: Currency) -> Option<Decimal> {
        self.rates.get(&currency).copied()
    }

    pub fn rates(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        self.rates.iter().map(|(c, r)| (*c, *r))
    }

    /// Cross rate between two currencies of the table.
    pub fn pair(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate> {
        let missing = |c: Currency| EngineError::RateUnavailable(format!("no rate for {c}"));
        let from_rate = self.get(from).ok_or_else(|| missing(from))?;
        let to_rate = self.get(to).ok_or_else(|| missing(to))?;
        let rate = to_rate.checked_div(from_rate).ok_or_else(|| {
            EngineError::RateUnavailable(format!("rate {from}->{to} out of range"))
        })?;
        ExchangeRate::new(from, to, rate)
    }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Current rate from `from` to `to`, or `RateUnavailable`.
    async fn rate(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate>;

    /// Every current rate, or `RateUnavailable`.
    async fn all_rates(&self) -> ResultEngine<RateTable>;
}

/// [`RateProvider`] serving a fixed table.
#[derive(Clone, Debug)]
pub struct StaticRateProvider {
    table: RateTable,
}

impl StaticRateProvider {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn rate(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate> {
        self.table.pair(from, to)
    }

    async fn all_rates(&self) -> ResultEngine<RateTable> {
        Ok(self.table.clone())
    }
}
