//! JSON bodies exchanged over the HTTP boundary.
//!
//! Amounts and rates are decimals in major units and travel as JSON numbers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterRequest {
        pub username: String,
        #[serde(alias = "password_hash")]
        pub password: String,
        pub email: Option<String>,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MessageResponse {
        pub message: String,
    }
}

pub mod wallet {
    use super::*;

    /// Balance of every supported currency, in major units.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Balance {
        #[serde(rename = "USD")]
        pub usd: Decimal,
        #[serde(rename = "RUB")]
        pub rub: Decimal,
        #[serde(rename = "EUR")]
        pub eur: Decimal,
    }

    /// Body of deposit and withdraw requests.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AmountRequest {
        pub amount: Decimal,
        pub currency: String,
    }
}

pub mod exchange {
    use super::*;

    use crate::wallet::Balance;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExchangeRequest {
        pub from_currency: String,
        pub to_currency: String,
        pub amount: Decimal,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExchangeResponse {
        /// Amount credited in `to_currency`.
        pub exchanged_amount: Decimal,
        pub new_balance: Balance,
    }

    /// Rates against the base currency of the rate service: `1 base = rate code`.
    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RatesResponse {
        pub rates: BTreeMap<String, Decimal>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Deposit,
        Withdraw,
        Exchange,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        /// Defaults to 50, capped at 500 by the server.
        pub limit: Option<u64>,
    }

    /// One balance change of a transaction.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LegView {
        pub currency: String,
        /// Signed, in major units.
        pub amount: Decimal,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub kind: TransactionKind,
        pub occurred_at: DateTime<Utc>,
        /// Rate applied, exchanges only.
        pub rate: Option<Decimal>,
        pub legs: Vec<LegView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }
}

pub mod error {
    use super::*;

    /// Body of every non-2xx response.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ErrorResponse {
        pub error: String,
        /// Stable machine-readable code, e.g. `insufficient_funds`.
        pub code: String,
        /// The service is temporarily unavailable (503): the same request may
        /// succeed later. Storage failures have already been retried by the
        /// server when this is set.
        pub retryable: bool,
    }
}
