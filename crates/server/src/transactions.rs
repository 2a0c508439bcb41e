//! Transactions API endpoints

use api_types::transaction::{
    LegView, TransactionKind as ApiKind, TransactionList, TransactionListResponse,
    TransactionView,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{ServerError, server::ServerState, user};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Deposit => ApiKind::Deposit,
        engine::TransactionKind::Withdraw => ApiKind::Withdraw,
        engine::TransactionKind::Exchange => ApiKind::Exchange,
    }
}

fn map_transaction(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        kind: map_kind(tx.kind),
        occurred_at: tx.occurred_at,
        rate: tx.rate,
        legs: tx
            .legs
            .into_iter()
            .map(|leg| LegView {
                currency: leg.currency.code().to_string(),
                amount: leg.amount.to_decimal(leg.currency),
            })
            .collect(),
    }
}

/// Journal of the authenticated user, newest first.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Query(query): Query<TransactionList>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let txs = state.facade.transactions(&user.username, limit).await?;

    Ok(Json(TransactionListResponse {
        transactions: txs.into_iter().map(map_transaction).collect(),
    }))
}
