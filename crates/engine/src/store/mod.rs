//! Durable wallet storage.
//!
//! [`WalletStore`] is the only owner of wallet state. Every balance change goes
//! through [`WalletStore::apply_atomic`], which runs the caller's mutation
//! against the latest committed wallet inside one atomic unit and records the
//! resulting journal entry in the same unit.

use async_trait::async_trait;

use crate::{JournalEntry, ResultEngine, Transaction, Wallet};

mod memory;
mod sql;

pub use memory::MemoryWalletStore;
pub use sql::SqlWalletStore;

/// Read-modify-write step run by [`WalletStore::apply_atomic`].
///
/// Receives the current wallet and returns the wallet to persist, or the
/// reason the change is rejected. A rejection leaves storage untouched.
pub type Mutation<'a> = &'a (dyn Fn(&Wallet) -> ResultEngine<Wallet> + Send + Sync);

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Create the zeroed wallet of a new user.
    ///
    /// Fails with `ExistingKey` when the user already owns a wallet.
    async fn create_wallet(&self, user_id: &str) -> ResultEngine<Wallet>;

    /// Latest committed snapshot, or `UserNotFound`.
    async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet>;

    /// Apply `mutation` to the wallet of `user_id` atomically.
    ///
    /// Concurrent calls for the same wallet are serialized: `mutation` always
    /// sees the state committed by the previous call.
    async fn apply_atomic(
        &self,
        user_id: &str,
        entry: JournalEntry,
        mutation: Mutation<'_>,
    ) -> ResultEngine<Wallet>;

    /// Journal of `user_id`, newest first.
    async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>>;
}
