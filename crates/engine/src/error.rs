//! The module contains the errors the engine can return.
//!
//! Errors fall in three groups:
//!
//! - request rejections ([`UserNotFound`], [`UnsupportedCurrency`],
//!   [`InsufficientFunds`], [`InvalidAmount`], [`ExistingKey`]): terminal, the
//!   stored state is untouched;
//! - collaborator failures ([`RateUnavailable`], [`StorageUnavailable`]): the
//!   stored state is untouched, only storage failures are worth retrying;
//! - [`PartialExchange`]: a debit committed without its credit and needs
//!   reconciliation.
//!
//!  [`UserNotFound`]: EngineError::UserNotFound
//!  [`UnsupportedCurrency`]: EngineError::UnsupportedCurrency
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`RateUnavailable`]: EngineError::RateUnavailable
//!  [`StorageUnavailable`]: EngineError::StorageUnavailable
//!  [`PartialExchange`]: EngineError::PartialExchange
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

use crate::{Currency, Money};

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("wallet for user \"{0}\" not found")]
    UserNotFound(String),
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] DbErr),
    #[error("{0}")]
    PartialExchange(Box<PartialExchange>),
}

/// Everything needed to replay the missing credit of an exchange whose debit
/// leg committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialExchange {
    pub user_id: String,
    pub from: Currency,
    pub to: Currency,
    pub debited: Money,
    pub pending_credit: Money,
    pub rate: Decimal,
}

impl std::fmt::Display for PartialExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "exchange partially applied for \"{}\": debited {} {}, credit of {} {} pending (rate {})",
            self.user_id,
            self.debited.to_decimal(self.from),
            self.from,
            self.pending_credit.to_decimal(self.to),
            self.to,
            self.rate,
        )
    }
}

impl EngineError {
    /// Stable machine-readable code, safe to expose to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "user_not_found",
            Self::UnsupportedCurrency(_) => "unsupported_currency",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ExistingKey(_) => "already_exists",
            Self::RateUnavailable(_) => "rate_unavailable",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::PartialExchange(_) => "partial_exchange",
        }
    }

    /// `true` when the facade may repeat the operation right away.
    ///
    /// Only transient storage failures qualify: rejected requests fail the
    /// same way again, a partial exchange must be reconciled, not replayed,
    /// and a rate outage is left to the caller (see `RateUnavailable`).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// `true` when the request itself was invalid (as opposed to a system
    /// failure).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::UnsupportedCurrency(_)
                | Self::InsufficientFunds(_)
                | Self::InvalidAmount(_)
                | Self::ExistingKey(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UserNotFound(a), Self::UserNotFound(b)) => a == b,
            (Self::UnsupportedCurrency(a), Self::UnsupportedCurrency(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::RateUnavailable(a), Self::RateUnavailable(b)) => a == b,
            (Self::StorageUnavailable(a), Self::StorageUnavailable(b)) => {
                a.to_string() == b.to_string()
            }
            (Self::PartialExchange(a), Self::PartialExchange(b)) => a == b,
            _ => false,
        }
    }
}
