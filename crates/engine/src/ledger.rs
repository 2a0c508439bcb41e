//! Single-wallet balance mutations.
//!
//! [`BalanceLedger`] is the only path through which balances change. It
//! validates deltas and hands the read-check-write step to
//! [`WalletStore::apply_atomic`], so the balance check always runs against
//! the latest committed state.

use std::sync::Arc;

use crate::{
    Currency, EngineError, JournalEntry, Money, ResultEngine, Transaction, TransactionKind, Wallet,
    WalletStore,
};

/// One proposed change: a signed amount in one currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceDelta {
    pub currency: Currency,
    pub amount: Money,
}

impl BalanceDelta {
    pub fn new(currency: Currency, amount: Money) -> Self {
        Self { currency, amount }
    }
}

fn ensure_nonzero(deltas: &[BalanceDelta]) -> ResultEngine<()> {
    if deltas.is_empty() {
        return Err(EngineError::InvalidAmount(
            "at least one delta is required".to_string(),
        ));
    }
    if let Some(delta) = deltas.iter().find(|d| d.amount.is_zero()) {
        return Err(EngineError::InvalidAmount(format!(
            "{} delta must be nonzero",
            delta.currency
        )));
    }
    Ok(())
}

/// Apply `deltas` in order to a copy of `wallet`.
///
/// Fails without touching `wallet` if any balance would become negative or
/// overflow.
pub fn apply_deltas_to(wallet: &Wallet, deltas: &[BalanceDelta]) -> ResultEngine<Wallet> {
    ensure_nonzero(deltas)?;

    let mut next = wallet.clone();
    for delta in deltas {
        let current = next.balance(delta.currency);
        let updated = current.checked_add(delta.amount).ok_or_else(|| {
            EngineError::InvalidAmount(format!("{} balance would overflow", delta.currency))
        })?;
        if updated.is_negative() {
            return Err(EngineError::InsufficientFunds(format!(
                "{} balance is {}, requested {}",
                delta.currency,
                current.to_decimal(delta.currency),
                delta.amount.to_decimal(delta.currency).abs(),
            )));
        }
        next.set_balance(delta.currency, updated);
    }
    Ok(next)
}

#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn WalletStore>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Apply one signed amount to one currency of the wallet of `user_id`.
    ///
    /// Positive amounts are recorded as deposits, negative ones as
    /// withdrawals. Returns the full post-mutation wallet.
    pub async fn apply_delta(
        &self,
        user_id: &str,
        currency: Currency,
        amount: Money,
    ) -> ResultEngine<Wallet> {
        let kind = if amount.is_negative() {
            TransactionKind::Withdraw
        } else {
            TransactionKind::Deposit
        };
        self.apply_deltas(
            user_id,
            &[BalanceDelta::new(currency, amount)],
            JournalEntry::new(kind),
        )
        .await
    }

    /// Apply several deltas to the wallet of `user_id` in one atomic unit:
    /// either all of them are committed or none.
    pub async fn apply_deltas(
        &self,
        user_id: &str,
        deltas: &[BalanceDelta],
        entry: JournalEntry,
    ) -> ResultEngine<Wallet> {
        ensure_nonzero(deltas)?;

        let mutation = |wallet: &Wallet| apply_deltas_to(wallet, deltas);
        let wallet = self.store.apply_atomic(user_id, entry, &mutation).await?;
        tracing::debug!(user_id, kind = entry.kind.as_str(), ?deltas, "balances updated");
        Ok(wallet)
    }

    pub async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.store.wallet(user_id).await
    }

    pub async fn open_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        self.store.create_wallet(user_id).await
    }

    pub async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        self.store.transactions(user_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use crate::MemoryWalletStore;

    use super::*;

    async fn ledger_with_wallet() -> BalanceLedger {
        let store = Arc::new(MemoryWalletStore::new());
        store.create_wallet("alice").await.unwrap();
        BalanceLedger::new(store)
    }

    #[test]
    fn apply_deltas_to_rejects_overdraft_without_touching_wallet() {
        let wallet = Wallet::new("alice");
        let res = apply_deltas_to(&wallet, &[BalanceDelta::new(Currency::Usd, Money::new(-1))]);
        assert!(matches!(res, Err(EngineError::InsufficientFunds(_))));
        assert_eq!(wallet, Wallet::new("alice"));
    }

    #[test]
    fn apply_deltas_to_is_all_or_nothing() {
        let mut wallet = Wallet::new("alice");
        wallet.set_balance(Currency::Usd, Money::new(100));
        let res = apply_deltas_to(
            &wallet,
            &[
                BalanceDelta::new(Currency::Usd, Money::new(-100)),
                BalanceDelta::new(Currency::Eur, Money::new(-1)),
            ],
        );
        assert!(res.is_err());
        assert_eq!(wallet.balance(Currency::Usd), Money::new(100));
    }

    #[test]
    fn apply_deltas_to_detects_overflow() {
        let mut wallet = Wallet::new("alice");
        wallet.set_balance(Currency::Rub, Money::new(i64::MAX));
        let res = apply_deltas_to(&wallet, &[BalanceDelta::new(Currency::Rub, Money::new(1))]);
        assert!(matches!(res, Err(EngineError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn most_negative_delta_is_insufficient_funds() {
        let ledger = ledger_with_wallet().await;
        let res = ledger
            .apply_delta("alice", Currency::Usd, Money::new(i64::MIN))
            .await;
        assert_eq!(
            res,
            Err(EngineError::InsufficientFunds(
                "USD balance is 0.00, requested 92233720368547758.08".to_string()
            ))
        );
        assert!(ledger.transactions("alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_delta_is_invalid() {
        let ledger = ledger_with_wallet().await;
        let res = ledger.apply_delta("alice", Currency::Usd, Money::ZERO).await;
        assert_eq!(
            res,
            Err(EngineError::InvalidAmount("USD delta must be nonzero".to_string()))
        );
    }

    #[tokio::test]
    async fn final_balance_is_sum_of_applied_deltas() {
        let ledger = ledger_with_wallet().await;
        let deltas = [500, -120, 30, -410, 1_000, -1];
        let mut expected = 0;
        for amount in deltas {
            let wallet = ledger
                .apply_delta("alice", Currency::Eur, Money::new(amount))
                .await
                .unwrap();
            expected += amount;
            assert_eq!(wallet.balance(Currency::Eur), Money::new(expected));
            assert!(wallet.balances().all(|(_, m)| !m.is_negative()));
        }
        assert_eq!(
            ledger.wallet("alice").await.unwrap().balance(Currency::Eur),
            Money::new(999)
        );
    }

    #[tokio::test]
    async fn overdraft_leaves_balance_unchanged() {
        let ledger = ledger_with_wallet().await;
        ledger
            .apply_delta("alice", Currency::Usd, Money::new(1_000))
            .await
            .unwrap();

        let res = ledger
            .apply_delta("alice", Currency::Usd, Money::new(-1_001))
            .await;

        assert!(matches!(res, Err(EngineError::InsufficientFunds(_))));
        let wallet = ledger.wallet("alice").await.unwrap();
        assert_eq!(wallet.balance(Currency::Usd), Money::new(1_000));
        assert_eq!(ledger.transactions("alice", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let ledger = ledger_with_wallet().await;
        assert_eq!(
            ledger.apply_delta("bob", Currency::Usd, Money::new(1)).await,
            Err(EngineError::UserNotFound("bob".to_string()))
        );
    }

    #[tokio::test]
    async fn journal_kind_follows_the_sign() {
        let ledger = ledger_with_wallet().await;
        ledger.apply_delta("alice", Currency::Usd, Money::new(10)).await.unwrap();
        ledger.apply_delta("alice", Currency::Usd, Money::new(-4)).await.unwrap();

        let journal = ledger.transactions("alice", 10).await.unwrap();
        assert_eq!(journal[0].kind, TransactionKind::Withdraw);
        assert_eq!(journal[1].kind, TransactionKind::Deposit);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deltas_do_not_lose_updates() {
        for _ in 0..50 {
            let ledger = ledger_with_wallet().await;
            ledger
                .apply_delta("alice", Currency::Usd, Money::new(100))
                .await
                .unwrap();

            let deposit = {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger.apply_delta("alice", Currency::Usd, Money::new(50)).await
                })
            };
            let withdraw = {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger.apply_delta("alice", Currency::Usd, Money::new(-30)).await
                })
            };
            deposit.await.unwrap().unwrap();
            withdraw.await.unwrap().unwrap();

            let wallet = ledger.wallet("alice").await.unwrap();
            assert_eq!(wallet.balance(Currency::Usd), Money::new(120));
        }
    }
}
