//! Entry point used by transports.
//!
//! [`WalletFacade`] turns boundary input (currency codes, major-unit decimal
//! amounts) into ledger and exchange calls, and retries transient storage
//! failures before surfacing them.

use std::{future::Future, sync::Arc, time::Duration};

use rust_decimal::Decimal;

use crate::{
    BalanceLedger, Currency, EngineError, ExchangeEngine, ExchangeMode, ExchangeRequest,
    Exchanged, Money, RateProvider, RateTable, ResultEngine, Transaction, Wallet, WalletStore,
};

const DEFAULT_RATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retry of [`EngineError::StorageUnavailable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, the first one included.
    pub attempts: u32,
    /// Sleep before retry `n` is `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> ResultEngine<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultEngine<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(operation, attempt, %err, "transient storage failure, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                res => return res,
            }
        }
    }
}

#[derive(Clone)]
pub struct WalletFacade {
    ledger: BalanceLedger,
    exchange: ExchangeEngine,
    retry: RetryPolicy,
}

impl WalletFacade {
    /// Return a builder for `WalletFacade`.
    pub fn builder(
        store: Arc<dyn WalletStore>,
        rates: Arc<dyn RateProvider>,
    ) -> WalletFacadeBuilder {
        WalletFacadeBuilder {
            store,
            rates,
            retry: RetryPolicy::default(),
            rate_timeout: DEFAULT_RATE_TIMEOUT,
            exchange_mode: ExchangeMode::default(),
        }
    }

    /// Create the zeroed wallet of a newly registered user.
    pub async fn open_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let wallet = self
            .retry
            .run("open_wallet", || self.ledger.open_wallet(user_id))
            .await?;
        tracing::info!(user_id, "wallet opened");
        Ok(wallet)
    }

    pub async fn deposit(
        &self,
        user_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> ResultEngine<Wallet> {
        let currency = Currency::try_from(currency)?;
        let amount = positive_amount(amount, currency)?;
        self.retry
            .run("deposit", || self.ledger.apply_delta(user_id, currency, amount))
            .await
    }

    pub async fn withdraw(
        &self,
        user_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> ResultEngine<Wallet> {
        let currency = Currency::try_from(currency)?;
        let debit = positive_amount(amount, currency)?
            .checked_neg()
            .ok_or_else(|| EngineError::InvalidAmount(format!("amount out of range: {amount}")))?;
        self.retry
            .run("withdraw", || self.ledger.apply_delta(user_id, currency, debit))
            .await
    }

    pub async fn balance(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.retry
            .run("balance", || self.ledger.wallet(user_id))
            .await
    }

    /// Exchange `amount` of `from` into `to`. Returns the updated wallet and
    /// the credited amount.
    pub async fn exchange(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> ResultEngine<Exchanged> {
        let from = Currency::try_from(from)?;
        let to = Currency::try_from(to)?;
        let request = ExchangeRequest {
            from,
            to,
            amount: positive_amount(amount, from)?,
        };
        self.retry
            .run("exchange", || self.exchange.exchange(user_id, request))
            .await
    }

    pub async fn rates(&self) -> ResultEngine<RateTable> {
        self.exchange.rates().await
    }

    /// Journal of `user_id`, newest first.
    pub async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        self.retry
            .run("transactions", || self.ledger.transactions(user_id, limit))
            .await
    }
}

fn positive_amount(amount: Decimal, currency: Currency) -> ResultEngine<Money> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Money::from_decimal(amount, currency)
}

/// The builder for `WalletFacade`
pub struct WalletFacadeBuilder {
    store: Arc<dyn WalletStore>,
    rates: Arc<dyn RateProvider>,
    retry: RetryPolicy,
    rate_timeout: Duration,
    exchange_mode: ExchangeMode,
}

impl WalletFacadeBuilder {
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Upper bound for a single rate lookup.
    pub fn rate_timeout(mut self, timeout: Duration) -> Self {
        self.rate_timeout = timeout;
        self
    }

    pub fn exchange_mode(mut self, mode: ExchangeMode) -> Self {
        self.exchange_mode = mode;
        self
    }

    /// Construct `WalletFacade`
    pub fn build(self) -> WalletFacade {
        let ledger = BalanceLedger::new(self.store);
        let exchange = ExchangeEngine::new(
            ledger.clone(),
            self.rates,
            self.rate_timeout,
            self.exchange_mode,
        );
        WalletFacade {
            ledger,
            exchange,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        MemoryWalletStore,
        testing::{FlakyStore, funded_store, static_rates},
    };

    use super::*;

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    async fn facade() -> WalletFacade {
        WalletFacade::builder(funded_store().await, static_rates()).build()
    }

    #[tokio::test]
    async fn deposit_and_withdraw_move_the_balance() {
        let facade = facade().await;

        let wallet = facade.deposit("alice", "eur", dec!(12.34)).await.unwrap();
        assert_eq!(wallet.balance(Currency::Eur), Money::new(1_234));

        let wallet = facade.withdraw("alice", " EUR ", dec!(2.34)).await.unwrap();
        assert_eq!(wallet.balance(Currency::Eur), Money::new(1_000));
        assert_eq!(wallet.balance(Currency::Usd), Money::new(15_000));
    }

    #[tokio::test]
    async fn non_positive_amounts_are_invalid() {
        let facade = facade().await;
        for amount in [dec!(-5), dec!(0)] {
            assert!(matches!(
                facade.withdraw("alice", "USD", amount).await,
                Err(EngineError::InvalidAmount(_))
            ));
            assert!(matches!(
                facade.deposit("alice", "USD", amount).await,
                Err(EngineError::InvalidAmount(_))
            ));
        }
        assert!(matches!(
            facade.deposit("alice", "USD", dec!(0.001)).await,
            Err(EngineError::InvalidAmount(_))
        ));
        assert_eq!(
            facade.balance("alice").await.unwrap().balance(Currency::Usd),
            Money::new(15_000)
        );
    }

    #[tokio::test]
    async fn unknown_currency_is_unsupported() {
        let facade = facade().await;
        assert_eq!(
            facade.deposit("alice", "GBP", dec!(1)).await,
            Err(EngineError::UnsupportedCurrency("GBP".to_string()))
        );
        assert!(matches!(
            facade.exchange("alice", "USD", "JPY", dec!(1)).await,
            Err(EngineError::UnsupportedCurrency(_))
        ));
    }

    #[tokio::test]
    async fn exchange_converts_at_provider_rate() {
        let facade = facade().await;

        let exchanged = facade.exchange("alice", "USD", "EUR", dec!(100)).await.unwrap();

        assert_eq!(exchanged.converted.to_decimal(Currency::Eur), dec!(90.00));
        assert_eq!(exchanged.wallet.balance(Currency::Usd), Money::new(5_000));
        assert_eq!(exchanged.wallet.balance(Currency::Eur), Money::new(9_000));
    }

    #[tokio::test]
    async fn storage_failures_are_retried() {
        let flaky = Arc::new(FlakyStore::new(funded_store().await, 0, 2));
        let facade = WalletFacade::builder(flaky.clone(), static_rates())
            .retry(fast_retry(3))
            .build();

        let wallet = facade.deposit("alice", "USD", dec!(1)).await.unwrap();

        assert_eq!(flaky.calls(), 3);
        assert_eq!(wallet.balance(Currency::Usd), Money::new(15_100));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let flaky = Arc::new(FlakyStore::new(funded_store().await, 0, 5));
        let facade = WalletFacade::builder(flaky.clone(), static_rates())
            .retry(fast_retry(2))
            .build();

        let res = facade.deposit("alice", "USD", dec!(1)).await;

        assert!(matches!(res, Err(EngineError::StorageUnavailable(_))));
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let flaky = Arc::new(FlakyStore::new(funded_store().await, u32::MAX, 0));
        let facade = WalletFacade::builder(flaky.clone(), static_rates())
            .retry(fast_retry(5))
            .build();

        let res = facade.withdraw("alice", "USD", dec!(1000)).await;

        assert!(matches!(res, Err(EngineError::InsufficientFunds(_))));
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn open_wallet_twice_is_a_conflict() {
        let facade =
            WalletFacade::builder(Arc::new(MemoryWalletStore::new()), static_rates()).build();

        let wallet = facade.open_wallet("bob").await.unwrap();
        assert!(wallet.balances().all(|(_, amount)| amount.is_zero()));
        assert_eq!(
            facade.open_wallet("bob").await,
            Err(EngineError::ExistingKey("bob".to_string()))
        );
    }

    #[tokio::test]
    async fn rates_pass_through() {
        let facade = facade().await;
        let table = facade.rates().await.unwrap();
        assert_eq!(table.get(Currency::Rub), Some(dec!(90)));
    }
}
