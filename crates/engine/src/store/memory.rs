use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;

use crate::{EngineError, JournalEntry, ResultEngine, Transaction, Wallet};

use super::{Mutation, WalletStore};

#[derive(Debug)]
struct Account {
    wallet: Wallet,
    journal: Vec<Transaction>,
}

/// Process-local [`WalletStore`].
///
/// Each wallet sits behind its own async mutex, which is held for the whole
/// read-modify-write. Used by tests and local runs without a database.
#[derive(Debug, Default)]
pub struct MemoryWalletStore {
    accounts: DashMap<String, Arc<Mutex<Account>>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn account(&self, user_id: &str) -> ResultEngine<Arc<Mutex<Account>>> {
        self.accounts
            .get(user_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn create_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let wallet = Wallet::new(user_id);
        match self.accounts.entry(user_id.to_string()) {
            Entry::Occupied(_) => Err(EngineError::ExistingKey(user_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(Account {
                    wallet: wallet.clone(),
                    journal: Vec::new(),
                })));
                Ok(wallet)
            }
        }
    }

    async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let account = self.account(user_id)?;
        let account = account.lock().await;
        Ok(account.wallet.clone())
    }

    async fn apply_atomic(
        &self,
        user_id: &str,
        entry: JournalEntry,
        mutation: Mutation<'_>,
    ) -> ResultEngine<Wallet> {
        let account = self.account(user_id)?;
        let mut account = account.lock().await;
        let after = mutation(&account.wallet)?;
        let changes = after.changes_since(&account.wallet)?;
        if !changes.is_empty() {
            account
                .journal
                .push(Transaction::record(user_id, entry, Utc::now(), &changes));
        }
        account.wallet = after.clone();
        Ok(after)
    }

    async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        let account = self.account(user_id)?;
        let account = account.lock().await;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(account.journal.iter().rev().take(limit).cloned().collect())
    }
}
