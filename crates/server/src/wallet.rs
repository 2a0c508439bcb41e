use api_types::wallet::{AmountRequest, Balance};
use axum::{Extension, Json, extract::State};
use engine::{Currency, Wallet};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn balance_view(wallet: &Wallet) -> Balance {
    let major = |currency: Currency| wallet.balance(currency).to_decimal(currency);
    Balance {
        usd: major(Currency::Usd),
        rub: major(Currency::Rub),
        eur: major(Currency::Eur),
    }
}

pub async fn balance(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Balance>, ServerError> {
    let wallet = state.facade.balance(&user.username).await?;
    Ok(Json(balance_view(&wallet)))
}

pub async fn deposit(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AmountRequest>,
) -> Result<Json<Balance>, ServerError> {
    let wallet = state
        .facade
        .deposit(&user.username, &payload.currency, payload.amount)
        .await?;
    Ok(Json(balance_view(&wallet)))
}

pub async fn withdraw(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AmountRequest>,
) -> Result<Json<Balance>, ServerError> {
    let wallet = state
        .facade
        .withdraw(&user.username, &payload.currency, payload.amount)
        .await?;
    Ok(Json(balance_view(&wallet)))
}
