//! The module contains `Wallet` struct and its storage model.

use std::collections::BTreeMap;

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;

use crate::{Currency, EngineError, Money, ResultEngine};

/// A user's multi-currency wallet.
///
/// A snapshot always carries exactly one balance per supported [`Currency`];
/// it is never partially populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Wallet {
    /// Owner of the wallet, set at creation and never changed.
    pub user_id: String,
    balances: BTreeMap<Currency, Money>,
}

impl Wallet {
    /// A wallet with every balance at zero.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balances: Currency::ALL.iter().map(|c| (*c, Money::ZERO)).collect(),
        }
    }

    /// Balance held in `currency`.
    #[must_use]
    pub fn balance(&self, currency: Currency) -> Money {
        self.balances.get(&currency).copied().unwrap_or(Money::ZERO)
    }

    /// All balances, ordered by currency.
    pub fn balances(&self) -> impl Iterator<Item = (Currency, Money)> + '_ {
        self.balances.iter().map(|(c, m)| (*c, *m))
    }

    pub(crate) fn set_balance(&mut self, currency: Currency, amount: Money) {
        self.balances.insert(currency, amount);
    }

    /// Signed per-currency differences from `before` to `self`, skipping
    /// unchanged currencies.
    pub(crate) fn changes_since(&self, before: &Wallet) -> ResultEngine<Vec<(Currency, Money)>> {
        let mut changes = Vec::new();
        for (currency, after) in self.balances() {
            let delta = after.checked_sub(before.balance(currency)).ok_or_else(|| {
                EngineError::InvalidAmount(format!("{currency} change would overflow"))
            })?;
            if !delta.is_zero() {
                changes.push((currency, delta));
            }
        }
        Ok(changes)
    }

    /// Build a snapshot from the stored rows of one user.
    pub(crate) fn from_models(user_id: &str, models: Vec<Model>) -> ResultEngine<Self> {
        if models.is_empty() {
            return Err(EngineError::UserNotFound(user_id.to_string()));
        }

        let mut balances = BTreeMap::new();
        for model in models {
            let currency = Currency::try_from(model.currency.as_str()).map_err(|_| {
                EngineError::StorageUnavailable(DbErr::Custom(format!(
                    "wallet of \"{user_id}\" holds unknown currency {}",
                    model.currency
                )))
            })?;
            balances.insert(currency, Money::new(model.balance));
        }
        if let Some(missing) = Currency::ALL.iter().find(|c| !balances.contains_key(c)) {
            return Err(EngineError::StorageUnavailable(DbErr::Custom(format!(
                "wallet of \"{user_id}\" has no {missing} balance"
            ))));
        }

        Ok(Self {
            user_id: user_id.to_string(),
            balances,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub currency: String,
    pub balance: i64,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Row for one balance of `wallet`, stamped with `updated_at`.
    pub(crate) fn balance_row(
        wallet: &Wallet,
        currency: Currency,
        updated_at: DateTimeUtc,
    ) -> Self {
        Self {
            user_id: ActiveValue::Set(wallet.user_id.clone()),
            currency: ActiveValue::Set(currency.code().to_string()),
            balance: ActiveValue::Set(wallet.balance(currency).minor()),
            updated_at: ActiveValue::Set(updated_at),
        }
    }
}
