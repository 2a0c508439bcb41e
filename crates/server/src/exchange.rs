//! Exchange API endpoints

use api_types::exchange::{ExchangeRequest, ExchangeResponse, RatesResponse};
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user, wallet::balance_view};

pub async fn rates(
    Extension(_): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<RatesResponse>, ServerError> {
    let table = state.facade.rates().await?;
    Ok(Json(RatesResponse {
        rates: table
            .rates()
            .map(|(currency, rate)| (currency.code().to_string(), rate))
            .collect(),
    }))
}

pub async fn exchange(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>, ServerError> {
    let exchanged = state
        .facade
        .exchange(
            &user.username,
            &payload.from_currency,
            &payload.to_currency,
            payload.amount,
        )
        .await?;

    Ok(Json(ExchangeResponse {
        exchanged_amount: exchanged.converted.to_decimal(exchanged.rate.to),
        new_balance: balance_view(&exchanged.wallet),
    }))
}
