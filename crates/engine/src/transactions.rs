//! Transaction journal.
//!
//! A `Transaction` records one committed wallet mutation. It is written in the
//! same storage transaction as the balances it describes, with one
//! [`Leg`](crate::Leg) per currency whose balance changed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, ResultEngine};

use super::legs::{self, Leg};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Exchange,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Exchange => "exchange",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "exchange" => Ok(Self::Exchange),
            other => Err(EngineError::StorageUnavailable(DbErr::Custom(format!(
                "invalid transaction kind: {other}"
            )))),
        }
    }
}

/// What a mutation should be recorded as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    pub kind: TransactionKind,
    /// Rate applied, for exchanges.
    pub rate: Option<Decimal>,
}

impl JournalEntry {
    #[must_use]
    pub fn new(kind: TransactionKind) -> Self {
        Self { kind, rate: None }
    }

    #[must_use]
    pub fn exchange(rate: Decimal) -> Self {
        Self {
            kind: TransactionKind::Exchange,
            rate: Some(rate),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub kind: TransactionKind,
    pub occurred_at: DateTime<Utc>,
    pub rate: Option<Decimal>,
    pub legs: Vec<Leg>,
}

impl Transaction {
    /// Journal record for `changes` applied to the wallet of `user_id`.
    pub fn record(
        user_id: &str,
        entry: JournalEntry,
        occurred_at: DateTime<Utc>,
        changes: &[(Currency, Money)],
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            user_id: user_id.to_string(),
            kind: entry.kind,
            occurred_at,
            rate: entry.rate,
            legs: changes
                .iter()
                .map(|(currency, amount)| Leg::new(id, *currency, *amount))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub occurred_at: DateTimeUtc,
    pub rate: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::legs::Entity")]
    Legs,
}

impl Related<super::legs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Legs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            rate: ActiveValue::Set(tx.rate.map(|r| r.to_string())),
        }
    }
}

impl TryFrom<(Model, Vec<legs::Model>)> for Transaction {
    type Error = EngineError;

    fn try_from((model, leg_models): (Model, Vec<legs::Model>)) -> ResultEngine<Self> {
        let corrupt = |what: &str| {
            EngineError::StorageUnavailable(DbErr::Custom(format!(
                "invalid {what} in transaction {}",
                model.id
            )))
        };
        let rate = match model.rate.as_deref() {
            Some(raw) => Some(raw.parse::<Decimal>().map_err(|_| corrupt("rate"))?),
            None => None,
        };
        let legs = leg_models
            .into_iter()
            .map(Leg::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Self {
            id: Uuid::parse_str(&model.id).map_err(|_| corrupt("id"))?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            user_id: model.user_id,
            occurred_at: model.occurred_at,
            rate,
            legs,
        })
    }
}
