use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{DatabaseConnection, EntityTrait};

use std::sync::Arc;

use crate::{exchange, transactions, user, wallet};
use engine::WalletFacade;

#[derive(Clone)]
pub struct ServerState {
    pub facade: Arc<WalletFacade>,
    /// Users table, for registration and authentication.
    pub db: DatabaseConnection,
}

/// Resolve the Basic credentials to a registered user and hand it to the
/// handlers as an `Extension<user::Model>`.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(credentials)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if credentials.username().is_empty() || credentials.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user = user::Entity::find_by_id(credentials.username())
        .one(&state.db)
        .await
        .map_err(|err| {
            tracing::error!("failed to load user: {err}");
            StatusCode::SERVICE_UNAVAILABLE
        })?
        .filter(|user| user.password == credentials.password())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let authenticated: Router<ServerState> = Router::new()
        .route("/balance", get(wallet::balance))
        .route("/wallet/deposit", post(wallet::deposit))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route("/exchange", post(exchange::exchange))
        .route("/exchange/rates", get(exchange::rates))
        .route("/transactions", get(transactions::list))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    let api = Router::new()
        .route("/register", post(user::register))
        .merge(authenticated);

    Router::new().nest("/api/v1", api).with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Serve until Ctrl-C.
pub async fn run_with_listener(
    facade: WalletFacade,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        facade: Arc::new(facade),
        db,
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub fn spawn_with_listener(
    facade: WalletFacade,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(facade, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
