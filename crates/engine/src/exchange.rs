//! Currency exchange within one wallet.
//!
//! The rate is fetched first, outside any storage transaction and under a
//! bounded timeout. Balances are only touched once a rate is known.
//!
//! Two modes are available:
//!
//! - [`ExchangeMode::Atomic`] (default): debit and credit are committed by a
//!   single [`BalanceLedger::apply_deltas`] call.
//! - [`ExchangeMode::TwoPhase`]: the debit is committed on its own, then the
//!   credit is retried with backoff. If the credit never lands the caller gets
//!   [`EngineError::PartialExchange`] describing what is pending.

use std::{sync::Arc, time::Duration};

use crate::{
    BalanceDelta, BalanceLedger, Currency, EngineError, ExchangeRate, JournalEntry, Money,
    PartialExchange, RateProvider, RateTable, ResultEngine, Wallet,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeMode {
    #[default]
    Atomic,
    TwoPhase {
        credit_attempts: u32,
        backoff: Duration,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub from: Currency,
    pub to: Currency,
    /// Amount debited from `from`, strictly positive.
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchanged {
    pub wallet: Wallet,
    pub converted: Money,
    pub rate: ExchangeRate,
}

/// Amount credited for `amount` at `rate`, truncated toward zero to the
/// precision of the target currency.
pub fn convert(amount: Money, rate: &ExchangeRate) -> ResultEngine<Money> {
    let value = amount
        .to_decimal(rate.from)
        .checked_mul(rate.value())
        .ok_or_else(|| EngineError::InvalidAmount("converted amount too large".to_string()))?;
    let converted = Money::truncated(value, rate.to)?;
    if converted.is_zero() {
        return Err(EngineError::InvalidAmount(format!(
            "{} {} converts to less than the smallest {} unit",
            amount.to_decimal(rate.from),
            rate.from,
            rate.to
        )));
    }
    Ok(converted)
}

#[derive(Clone)]
pub struct ExchangeEngine {
    ledger: BalanceLedger,
    rates: Arc<dyn RateProvider>,
    rate_timeout: Duration,
    mode: ExchangeMode,
}

impl ExchangeEngine {
    pub fn new(
        ledger: BalanceLedger,
        rates: Arc<dyn RateProvider>,
        rate_timeout: Duration,
        mode: ExchangeMode,
    ) -> Self {
        Self {
            ledger,
            rates,
            rate_timeout,
            mode,
        }
    }

    pub fn mode(&self) -> ExchangeMode {
        self.mode
    }

    /// Convert `request.amount` of `request.from` into `request.to` in the
    /// wallet of `user_id`.
    pub async fn exchange(
        &self,
        user_id: &str,
        request: ExchangeRequest,
    ) -> ResultEngine<Exchanged> {
        let ExchangeRequest { from, to, amount } = request;
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "exchange amount must be positive".to_string(),
            ));
        }
        if from == to {
            return Err(EngineError::InvalidAmount(format!(
                "cannot exchange {from} into itself"
            )));
        }

        let debit = BalanceDelta::new(
            from,
            amount
                .checked_neg()
                .ok_or_else(|| EngineError::InvalidAmount("amount out of range".to_string()))?,
        );

        let rate = self.lookup_rate(from, to).await?;
        let converted = convert(amount, &rate)?;
        let entry = JournalEntry::exchange(rate.value());

        let wallet = match self.mode {
            ExchangeMode::Atomic => {
                self.ledger
                    .apply_deltas(
                        user_id,
                        &[debit, BalanceDelta::new(to, converted)],
                        entry,
                    )
                    .await?
            }
            ExchangeMode::TwoPhase {
                credit_attempts,
                backoff,
            } => {
                self.ledger
                    .apply_deltas(user_id, &[debit], entry)
                    .await?;
                self.credit(user_id, amount, converted, &rate, credit_attempts, backoff)
                    .await?
            }
        };

        tracing::info!(
            user_id,
            %from,
            %to,
            amount = %amount.to_decimal(from),
            converted = %converted.to_decimal(to),
            rate = %rate.value(),
            "exchange applied"
        );
        Ok(Exchanged {
            wallet,
            converted,
            rate,
        })
    }

    /// Every rate known to the provider.
    pub async fn rates(&self) -> ResultEngine<RateTable> {
        tokio::time::timeout(self.rate_timeout, self.rates.all_rates())
            .await
            .map_err(|_| {
                EngineError::RateUnavailable(format!(
                    "rate table lookup timed out after {:?}",
                    self.rate_timeout
                ))
            })?
    }

    async fn lookup_rate(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate> {
        let rate = tokio::time::timeout(self.rate_timeout, self.rates.rate(from, to))
            .await
            .map_err(|_| {
                EngineError::RateUnavailable(format!(
                    "{from}->{to} lookup timed out after {:?}",
                    self.rate_timeout
                ))
            })??;
        if rate.from != from || rate.to != to {
            return Err(EngineError::RateUnavailable(format!(
                "asked for {from}->{to}, provider answered {}->{}",
                rate.from, rate.to
            )));
        }
        Ok(rate)
    }

    /// Second phase of a two-phase exchange; the debit is already committed.
    async fn credit(
        &self,
        user_id: &str,
        debited: Money,
        converted: Money,
        rate: &ExchangeRate,
        credit_attempts: u32,
        backoff: Duration,
    ) -> ResultEngine<Wallet> {
        let credit = [BalanceDelta::new(rate.to, converted)];
        let entry = JournalEntry::exchange(rate.value());
        let attempts = credit_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ledger.apply_deltas(user_id, &credit, entry).await {
                Ok(wallet) => return Ok(wallet),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(user_id, attempt, %err, "exchange credit failed, retrying");
                    tokio::time::sleep(backoff * attempt).await;
                }
                Err(err) => {
                    let partial = PartialExchange {
                        user_id: user_id.to_string(),
                        from: rate.from,
                        to: rate.to,
                        debited,
                        pending_credit: converted,
                        rate: rate.value(),
                    };
                    tracing::error!(
                        user_id,
                        from = %partial.from,
                        to = %partial.to,
                        debited = %debited.to_decimal(partial.from),
                        pending_credit = %converted.to_decimal(partial.to),
                        rate = %partial.rate,
                        attempts = attempt,
                        %err,
                        "exchange credit not applied, wallet needs reconciliation"
                    );
                    return Err(EngineError::PartialExchange(Box::new(partial)));
                }
            }
        }
    }
}
