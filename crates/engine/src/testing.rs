//! Test doubles shared by the unit tests of the crate.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal_macros::dec;
use sea_orm::DbErr;

use crate::{
    BalanceLedger, Currency, EngineError, ExchangeRate, JournalEntry, MemoryWalletStore, Money,
    RateProvider, RateTable, ResultEngine, StaticRateProvider, Transaction, Wallet, WalletStore,
    store::Mutation,
};

/// Store whose `apply_atomic` fails with `StorageUnavailable` for calls
/// `fail_after..fail_after + failures` (0-based).
pub struct FlakyStore {
    pub inner: Arc<MemoryWalletStore>,
    calls: AtomicU32,
    fail_after: u32,
    failures: u32,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryWalletStore>, fail_after: u32, failures: u32) -> Self {
        Self {
            inner,
            calls: AtomicU32::new(0),
            fail_after,
            failures,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletStore for FlakyStore {
    async fn create_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.inner.create_wallet(user_id).await
    }

    async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.inner.wallet(user_id).await
    }

    async fn apply_atomic(
        &self,
        user_id: &str,
        entry: JournalEntry,
        mutation: Mutation<'_>,
    ) -> ResultEngine<Wallet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_after && call < self.fail_after.saturating_add(self.failures) {
            return Err(EngineError::StorageUnavailable(DbErr::Custom(
                "connection reset".to_string(),
            )));
        }
        self.inner.apply_atomic(user_id, entry, mutation).await
    }

    async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        self.inner.transactions(user_id, limit).await
    }
}

pub struct DownRates;

#[async_trait]
impl RateProvider for DownRates {
    async fn rate(&self, _: Currency, _: Currency) -> ResultEngine<ExchangeRate> {
        Err(EngineError::RateUnavailable("connection refused".to_string()))
    }

    async fn all_rates(&self) -> ResultEngine<RateTable> {
        Err(EngineError::RateUnavailable("connection refused".to_string()))
    }
}

/// Provider that answers long after any sane timeout.
pub struct SlowRates;

#[async_trait]
impl RateProvider for SlowRates {
    async fn rate(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        ExchangeRate::new(from, to, dec!(1))
    }

    async fn all_rates(&self) -> ResultEngine<RateTable> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        RateTable::new(Currency::Usd, std::iter::empty())
    }
}

/// USD base, 1 USD = 0.9 EUR = 90 RUB.
pub fn static_rates() -> Arc<dyn RateProvider> {
    Arc::new(StaticRateProvider::new(
        RateTable::new(
            Currency::Usd,
            [(Currency::Eur, dec!(0.9)), (Currency::Rub, dec!(90))],
        )
        .unwrap(),
    ))
}

/// Wallet of "alice" holding 150.00 USD.
pub async fn funded_store() -> Arc<MemoryWalletStore> {
    let store = Arc::new(MemoryWalletStore::new());
    store.create_wallet("alice").await.unwrap();
    BalanceLedger::new(store.clone())
        .apply_delta("alice", Currency::Usd, Money::new(15_000))
        .await
        .unwrap();
    store
}
