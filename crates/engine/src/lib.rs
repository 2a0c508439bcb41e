//! Multi-currency wallet ledger.
//!
//! Every user owns one [`Wallet`] with a balance per supported [`Currency`].
//! Balances change only through the [`BalanceLedger`], either directly
//! (deposit, withdraw) or through the [`ExchangeEngine`]. Transports talk to
//! the [`WalletFacade`].
//!
//! Storage and exchange rates are capabilities injected at construction:
//! [`WalletStore`] and [`RateProvider`].

pub use currency::Currency;
pub use error::{EngineError, PartialExchange};
pub use exchange::{ExchangeEngine, ExchangeMode, ExchangeRequest, Exchanged, convert};
pub use facade::{RetryPolicy, WalletFacade, WalletFacadeBuilder};
pub use ledger::{BalanceDelta, BalanceLedger, apply_deltas_to};
pub use legs::Leg;
pub use money::Money;
pub use rates::{ExchangeRate, RateProvider, RateTable, StaticRateProvider};
pub use store::{MemoryWalletStore, Mutation, SqlWalletStore, WalletStore};
pub use transactions::{JournalEntry, Transaction, TransactionKind};
pub use wallets::Wallet;

mod currency;
mod error;
mod exchange;
mod facade;
mod ledger;
mod legs;
mod money;
mod rates;
mod store;
#[cfg(test)]
mod testing;
mod transactions;
mod wallets;

pub type ResultEngine<T> = Result<T, EngineError>;
