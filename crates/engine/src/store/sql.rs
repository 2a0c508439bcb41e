use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{
    DatabaseConnection, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Currency, EngineError, JournalEntry, ResultEngine, Transaction, Wallet, legs, transactions,
    wallets,
};

use super::{Mutation, WalletStore};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// In-process mutex per wallet.
///
/// Row locks (`SELECT ... FOR UPDATE`) serialize writers on Postgres; SQLite
/// ignores them, so writers of the same wallet also queue here.
#[derive(Debug, Default)]
struct WalletLocks(DashMap<String, Arc<Mutex<()>>>);

impl WalletLocks {
    async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.0.entry(user_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}

/// [`WalletStore`] backed by a relational database through `sea-orm`.
///
/// A wallet is one `wallets` row per currency; mutations also append to the
/// `transactions`/`legs` journal.
#[derive(Debug)]
pub struct SqlWalletStore {
    database: DatabaseConnection,
    locks: WalletLocks,
}

impl SqlWalletStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self {
            database,
            locks: WalletLocks::default(),
        }
    }

    async fn load_for_update(db_tx: &DatabaseTransaction, user_id: &str) -> ResultEngine<Wallet> {
        let models = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .lock_exclusive()
            .all(db_tx)
            .await?;
        Wallet::from_models(user_id, models)
    }

    async fn persist(
        db_tx: &DatabaseTransaction,
        wallet: &Wallet,
        tx: &Transaction,
    ) -> ResultEngine<()> {
        for leg in &tx.legs {
            wallets::ActiveModel::balance_row(wallet, leg.currency, tx.occurred_at)
                .update(db_tx)
                .await?;
        }
        transactions::ActiveModel::from(tx).insert(db_tx).await?;
        for leg in &tx.legs {
            legs::ActiveModel::from(leg).insert(db_tx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl WalletStore for SqlWalletStore {
    async fn create_wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let wallet = Wallet::new(user_id);
        with_tx!(self, |db_tx| {
            let exists = wallets::Entity::find()
                .filter(wallets::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(user_id.to_string()));
            }

            let now = Utc::now();
            wallets::Entity::insert_many(
                Currency::ALL
                    .iter()
                    .map(|currency| wallets::ActiveModel::balance_row(&wallet, *currency, now)),
            )
            .exec(&db_tx)
            .await?;
            tracing::debug!(user_id, "wallet created");
            Ok(wallet)
        })
    }

    async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        let models = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?;
        Wallet::from_models(user_id, models)
    }

    async fn apply_atomic(
        &self,
        user_id: &str,
        entry: JournalEntry,
        mutation: Mutation<'_>,
    ) -> ResultEngine<Wallet> {
        let _guard = self.locks.lock(user_id).await;
        with_tx!(self, |db_tx| {
            let before = Self::load_for_update(&db_tx, user_id).await?;
            let after = mutation(&before)?;
            let changes = after.changes_since(&before)?;
            if !changes.is_empty() {
                let tx = Transaction::record(user_id, entry, Utc::now(), &changes);
                Self::persist(&db_tx, &after, &tx).await?;
            }
            Ok(after)
        })
    }

    async fn transactions(&self, user_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        let tx_models = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;
        if tx_models.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = tx_models.iter().map(|m| m.id.clone()).collect();
        let mut legs_by_tx: HashMap<String, Vec<legs::Model>> = HashMap::new();
        for leg in legs::Entity::find()
            .filter(legs::Column::TransactionId.is_in(ids))
            .order_by_asc(legs::Column::Currency)
            .all(&self.database)
            .await?
        {
            legs_by_tx
                .entry(leg.transaction_id.clone())
                .or_default()
                .push(leg);
        }

        tx_models
            .into_iter()
            .map(|model| {
                let legs = legs_by_tx.remove(&model.id).unwrap_or_default();
                Transaction::try_from((model, legs))
            })
            .collect()
    }
}
