//! Registered users and the registration endpoint.

use api_types::user::{MessageResponse, RegisterRequest};
use axum::{Json, extract::State, http::StatusCode};
use engine::EngineError;
use sea_orm::{ActiveValue, Condition, entity::prelude::*};

use crate::{ServerError, server::ServerState};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Register a user and open their zeroed wallet.
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ServerError::Generic(
            "username and password are required".to_string(),
        ));
    }
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);

    let mut taken = Condition::any().add(Column::Username.eq(username));
    if let Some(email) = &email {
        taken = taken.add(Column::Email.eq(email.as_str()));
    }
    if Entity::find().filter(taken).one(&state.db).await?.is_some() {
        return Err(EngineError::ExistingKey("username or email already exists".to_string()).into());
    }

    ActiveModel {
        username: ActiveValue::Set(username.to_string()),
        password: ActiveValue::Set(payload.password),
        email: ActiveValue::Set(email),
        created_at: ActiveValue::Set(chrono::Utc::now()),
    }
    .insert(&state.db)
    .await?;

    if let Err(err) = state.facade.open_wallet(username).await {
        tracing::error!(username, %err, "failed to open wallet, removing user");
        if let Err(cleanup) = Entity::delete_by_id(username).exec(&state.db).await {
            tracing::error!(username, %cleanup, "failed to remove user without wallet");
        }
        return Err(err.into());
    }

    tracing::info!(username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}
