use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use shared::{Actor, CreateIntentRequest, PaymentIntent, Role, UpdateStatusRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::coordinator::TransactionCoordinator;
use crate::error::PaymentError;
use crate::intents::PaymentIntentStore;
use crate::ledger::{LoyaltyLedger, LoyaltySummary};
use crate::store::PaymentStore;

/// Set by the identity provider's gateway on every authenticated request.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Clone)]
pub struct AppState {
    pub intents: Arc<PaymentIntentStore>,
    pub coordinator: Arc<TransactionCoordinator>,
    pub ledger: Arc<LoyaltyLedger>,
}

impl AppState {
    pub fn new(store: Arc<dyn PaymentStore>, platform_fee_pct: u32) -> Self {
        let ledger = Arc::new(LoyaltyLedger::new(store.clone()));
        Self {
            intents: Arc::new(PaymentIntentStore::new(
                store.clone(),
                ledger.clone(),
                platform_fee_pct,
            )),
            coordinator: Arc::new(TransactionCoordinator::new(store, ledger.clone())),
            ledger,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/payment-intents", post(create_intent).get(list_intents))
        .route("/payment-intents/:id", get(get_intent))
        .route("/payment-intents/:id/status", patch(update_status))
        .route("/loyalty", get(loyalty_summary))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_value(headers, USER_ID_HEADER).and_then(|value| value.parse::<Uuid>().ok());
    let role = header_value(headers, ROLE_HEADER).and_then(|value| value.parse::<Role>().ok());

    match (user_id, role) {
        (Some(user_id), Some(role)) => Ok(Actor::new(user_id, role)),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "missing or invalid principal".to_string(),
            }),
        )),
    }
}

fn error_response(err: PaymentError) -> ApiError {
    let status = match &err {
        PaymentError::InvalidAmount | PaymentError::InvalidCurrency(_) => StatusCode::BAD_REQUEST,
        PaymentError::Forbidden(_) => StatusCode::FORBIDDEN,
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::InvalidTransition { .. } => StatusCode::CONFLICT,
        PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let error = if err.is_client_error() {
        err.to_string()
    } else {
        tracing::error!("Payment request failed: {}", err);
        "internal error".to_string()
    };

    (status, Json(ErrorResponse { error }))
}

pub async fn create_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>), ApiError> {
    let actor = actor_from_headers(&headers)?;
    let intent = state
        .intents
        .create(actor.user_id, request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn list_intents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PaymentIntent>>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let intents = state
        .intents
        .list_for_user(actor.user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(intents))
}

pub async fn get_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<Uuid>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let intent = state
        .intents
        .get(&actor, intent_id)
        .await
        .map_err(error_response)?;
    Ok(Json(intent))
}

pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(intent_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let intent = state
        .coordinator
        .update_status(&actor, intent_id, request)
        .await
        .map_err(error_response)?;
    Ok(Json(intent))
}

pub async fn loyalty_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoyaltySummary>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let summary = state
        .ledger
        .summary(actor.user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}

pub async fn health_check() -> &'static str {
    "OK"
}
