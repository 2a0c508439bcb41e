//! Transaction legs.
//!
//! A [`Leg`] is a single balance change of one currency of a wallet, recorded
//! as part of a [`Transaction`](crate::Transaction).
//!
//! Amounts are stored as signed integer **minor units**:
//! - positive values increase the balance
//! - negative values decrease the balance

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub currency: Currency,
    pub amount: Money,
}

impl Leg {
    pub fn new(transaction_id: Uuid, currency: Currency, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            currency,
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "legs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub currency: String,
    pub amount_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Leg> for ActiveModel {
    fn from(leg: &Leg) -> Self {
        Self {
            id: ActiveValue::Set(leg.id.to_string()),
            transaction_id: ActiveValue::Set(leg.transaction_id.to_string()),
            currency: ActiveValue::Set(leg.currency.code().to_string()),
            amount_minor: ActiveValue::Set(leg.amount.minor()),
        }
    }
}

impl TryFrom<Model> for Leg {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let invalid_id = || EngineError::StorageUnavailable(DbErr::Custom("invalid leg id".to_string()));
        Ok(Self {
            id: Uuid::parse_str(&model.id).map_err(|_| invalid_id())?,
            transaction_id: Uuid::parse_str(&model.transaction_id).map_err(|_| invalid_id())?,
            currency: Currency::try_from(model.currency.as_str()).map_err(|_| {
                EngineError::StorageUnavailable(DbErr::Custom(format!(
                    "leg holds unknown currency {}",
                    model.currency
                )))
            })?,
            amount: Money::new(model.amount_minor),
        })
    }
}
