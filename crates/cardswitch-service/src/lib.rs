//! REST surface for the card orchestration core: authorization, settlement,
//! card lifecycle, processor webhooks, ledger audit, and health.

#![deny(unsafe_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cardswitch_core::{
    AuthorizationOutcome, AuthorizationPipeline, AuthorizationRequest, BankAccountAdapter, Card,
    CardStore, CoreError, Currency, LedgerEntryFilter, LedgerStore, LedgerTransactionType,
    MerchantMetadata, Money, ProcessorAuthorizationEvent, ProcessorClearingEvent,
    ProcessorReversalEvent, SettlementPipeline,
};
use cardswitch_core::InboundProcessorAdapter;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone)]
pub struct ServiceState {
    pub cards: Arc<dyn CardStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub adapter: Arc<dyn BankAccountAdapter>,
    pub authorize: Arc<AuthorizationPipeline>,
    pub settle: Arc<SettlementPipeline>,
    pub processors: Arc<Vec<InboundProcessorAdapter>>,
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/authorizations", post(create_authorization))
        .route("/settlement/clear/:authorization_id", post(clear_authorization))
        .route("/settlement/release/:authorization_id", post(release_authorization))
        .route("/settlement/reverse/:authorization_id", post(reverse_authorization))
        .route("/cards", post(create_card))
        .route("/cards/:card_id", get(get_card))
        .route("/cards/:card_id/activate", post(activate_card))
        .route("/cards/:card_id/freeze", post(freeze_card))
        .route("/cards/:card_id/close", post(close_card))
        .route("/webhooks/processor/:processor_name/authorize", post(webhook_authorize))
        .route("/webhooks/processor/:processor_name/clear", post(webhook_clear))
        .route("/webhooks/processor/:processor_name/reverse", post(webhook_reverse))
        .route("/health", get(health))
        .route("/ledger/entries", get(list_ledger_entries))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Core(err) = self;
        let status = match &err {
            CoreError::InvalidArgument(_) | CoreError::InvalidState(_) | CoreError::InsufficientFunds { .. } => {
                StatusCode::BAD_REQUEST
            }
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::DeclinedByPolicy(_) => StatusCode::BAD_REQUEST,
            CoreError::BankCoreError { .. }
            | CoreError::Store(_)
            | CoreError::UnknownTransaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CreateAuthorizationRequest {
    card_id: Uuid,
    amount: String,
    currency: String,
    merchant_name: String,
    merchant_category_code: Option<String>,
    merchant_city: Option<String>,
    merchant_country: Option<String>,
    idempotency_key: Option<String>,
}

async fn create_authorization(
    State(state): State<ServiceState>,
    Json(request): Json<CreateAuthorizationRequest>,
) -> Result<Json<AuthorizationOutcome>, ApiError> {
    let currency = request
        .currency
        .parse::<Currency>()
        .map_err(ApiError::from)?;
    let amount = Money::from_str_amount(&request.amount, currency).map_err(ApiError::from)?;
    let idempotency_key = request
        .idempotency_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .authorize
        .authorize(AuthorizationRequest {
            card_id: request.card_id,
            amount,
            merchant: MerchantMetadata {
                name: request.merchant_name,
                mcc: request.merchant_category_code,
                city: request.merchant_city,
                country: request.merchant_country,
            },
            idempotency_key,
        })
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Clone, Deserialize)]
struct SettlementQuery {
    amount: Option<String>,
    currency: Option<String>,
    idempotency_key: Option<String>,
}

fn parse_settlement_amount(query: &SettlementQuery) -> Result<Money, ApiError> {
    let currency = query
        .currency
        .as_deref()
        .unwrap_or("USD")
        .parse::<Currency>()
        .map_err(ApiError::from)?;
    let amount = query.amount.as_deref().ok_or_else(|| {
        ApiError::from(CoreError::invalid_argument("amount query parameter is required"))
    })?;
    Money::from_str_amount(amount, currency).map_err(ApiError::from)
}

async fn clear_authorization(
    Path(authorization_id): Path<Uuid>,
    State(state): State<ServiceState>,
    Query(query): Query<SettlementQuery>,
) -> Result<StatusCode, ApiError> {
    let clearing_amount = parse_settlement_amount(&query)?;
    let idempotency_key = query
        .idempotency_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state
        .settle
        .clear(authorization_id, clearing_amount, &idempotency_key)
        .await?;
    Ok(StatusCode::OK)
}

async fn release_authorization(
    Path(authorization_id): Path<Uuid>,
    State(state): State<ServiceState>,
    Query(query): Query<SettlementQuery>,
) -> Result<StatusCode, ApiError> {
    let idempotency_key = query
        .idempotency_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state.settle.release(authorization_id, &idempotency_key).await?;
    Ok(StatusCode::OK)
}

async fn reverse_authorization(
    Path(authorization_id): Path<Uuid>,
    State(state): State<ServiceState>,
    Query(query): Query<SettlementQuery>,
) -> Result<StatusCode, ApiError> {
    let reversal_amount = parse_settlement_amount(&query)?;
    let idempotency_key = query
        .idempotency_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state
        .settle
        .reverse(authorization_id, reversal_amount, &idempotency_key)
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Clone, Deserialize)]
struct CreateCardRequest {
    cardholder_name: String,
    last4: String,
    expiration_date: NaiveDate,
    owner_id: String,
}

async fn create_card(
    State(state): State<ServiceState>,
    Json(request): Json<CreateCardRequest>,
) -> Result<Json<Card>, ApiError> {
    let card = Card::issue(request.cardholder_name, request.last4, request.expiration_date, request.owner_id);
    let saved = state.cards.save(card).await.map_err(CoreError::from)?;
    Ok(Json(saved))
}

async fn get_card(
    Path(card_id): Path<Uuid>,
    State(state): State<ServiceState>,
) -> Result<Json<Card>, ApiError> {
    let card = state
        .cards
        .find_by_id(card_id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(format!("card {card_id} not found")))?;
    Ok(Json(card))
}

async fn mutate_card_state(
    state: &ServiceState,
    card_id: Uuid,
    transition: impl FnOnce(&mut Card) -> Result<(), CoreError>,
) -> Result<Json<Card>, ApiError> {
    let mut card = state
        .cards
        .find_by_id(card_id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(format!("card {card_id} not found")))?;
    transition(&mut card)?;
    let saved = state.cards.save(card).await.map_err(CoreError::from)?;
    Ok(Json(saved))
}

async fn activate_card(Path(card_id): Path<Uuid>, State(state): State<ServiceState>) -> Result<Json<Card>, ApiError> {
    mutate_card_state(&state, card_id, |card| card.activate()).await
}

async fn freeze_card(Path(card_id): Path<Uuid>, State(state): State<ServiceState>) -> Result<Json<Card>, ApiError> {
    mutate_card_state(&state, card_id, |card| card.freeze()).await
}

async fn close_card(Path(card_id): Path<Uuid>, State(state): State<ServiceState>) -> Result<Json<Card>, ApiError> {
    mutate_card_state(&state, card_id, |card| card.close()).await
}

fn find_processor<'a>(state: &'a ServiceState, name: &str) -> Option<&'a InboundProcessorAdapter> {
    state.processors.iter().find(|p| p.processor_name() == name)
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookAuthorizeRequest {
    processor_transaction_id: String,
    card_token: String,
    amount: String,
    currency: String,
    merchant_name: String,
    merchant_category_code: Option<String>,
    merchant_city: Option<String>,
    merchant_country: Option<String>,
    idempotency_key: String,
}

async fn webhook_authorize(
    Path(processor_name): Path<String>,
    State(state): State<ServiceState>,
    Json(request): Json<WebhookAuthorizeRequest>,
) -> Result<Json<AuthorizationOutcome>, ApiError> {
    let processor = find_processor(&state, &processor_name)
        .ok_or_else(|| CoreError::not_found(format!("unknown processor '{processor_name}'")))?;
    let currency = request.currency.parse::<Currency>().map_err(ApiError::from)?;
    let amount = Money::from_str_amount(&request.amount, currency).map_err(ApiError::from)?;

    let outcome = processor
        .handle_authorize(ProcessorAuthorizationEvent {
            processor_transaction_id: request.processor_transaction_id,
            card_token: request.card_token,
            amount,
            merchant: MerchantMetadata {
                name: request.merchant_name,
                mcc: request.merchant_category_code,
                city: request.merchant_city,
                country: request.merchant_country,
            },
            idempotency_key: request.idempotency_key,
        })
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookSettlementRequest {
    processor_transaction_id: String,
    amount: String,
    currency: String,
    idempotency_key: String,
}

async fn webhook_clear(
    Path(processor_name): Path<String>,
    State(state): State<ServiceState>,
    Json(request): Json<WebhookSettlementRequest>,
) -> Result<StatusCode, ApiError> {
    let processor = find_processor(&state, &processor_name)
        .ok_or_else(|| CoreError::not_found(format!("unknown processor '{processor_name}'")))?;
    let currency = request.currency.parse::<Currency>().map_err(ApiError::from)?;
    let amount = Money::from_str_amount(&request.amount, currency).map_err(ApiError::from)?;
    processor
        .handle_clear(ProcessorClearingEvent {
            processor_transaction_id: request.processor_transaction_id,
            amount,
            idempotency_key: request.idempotency_key,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn webhook_reverse(
    Path(processor_name): Path<String>,
    State(state): State<ServiceState>,
    Json(request): Json<WebhookSettlementRequest>,
) -> Result<StatusCode, ApiError> {
    let processor = find_processor(&state, &processor_name)
        .ok_or_else(|| CoreError::not_found(format!("unknown processor '{processor_name}'")))?;
    let currency = request.currency.parse::<Currency>().map_err(ApiError::from)?;
    let amount = Money::from_str_amount(&request.amount, currency).map_err(ApiError::from)?;
    processor
        .handle_reverse(ProcessorReversalEvent {
            processor_transaction_id: request.processor_transaction_id,
            amount,
            idempotency_key: request.idempotency_key,
        })
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    adapter_name: &'static str,
    adapter_healthy: bool,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        adapter_name: state.adapter.adapter_name(),
        adapter_healthy: state.adapter.is_healthy().await,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct LedgerEntriesQuery {
    authorization_id: Option<Uuid>,
    card_id: Option<Uuid>,
    transaction_type: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

fn parse_transaction_type_filter(value: Option<&str>) -> Result<Option<LedgerTransactionType>, ApiError> {
    let Some(value) = value else { return Ok(None) };
    let parsed = match value.to_ascii_uppercase().as_str() {
        "AUTH_HOLD" => LedgerTransactionType::AuthHold,
        "AUTH_RELEASE" => LedgerTransactionType::AuthRelease,
        "CLEARING_COMMIT" => LedgerTransactionType::ClearingCommit,
        "REVERSAL" => LedgerTransactionType::Reversal,
        "DEPOSIT" => LedgerTransactionType::Deposit,
        "WITHDRAWAL" => LedgerTransactionType::Withdrawal,
        other => {
            return Err(ApiError::from(CoreError::invalid_argument(format!(
                "invalid transaction type '{other}'"
            ))))
        }
    };
    Ok(Some(parsed))
}

async fn list_ledger_entries(
    State(state): State<ServiceState>,
    Query(query): Query<LedgerEntriesQuery>,
) -> Result<Json<Vec<cardswitch_core::LedgerEntry>>, ApiError> {
    let transaction_type = parse_transaction_type_filter(query.transaction_type.as_deref())?;
    let entries = state
        .ledger
        .list(LedgerEntryFilter {
            authorization_id: query.authorization_id,
            card_id: query.card_id,
            transaction_type,
            limit: query.limit,
            offset: query.offset,
        })
        .await
        .map_err(CoreError::from)?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use cardswitch_adapters::{
        InMemoryAuthorizationStore, InMemoryCardStore, InMemoryHoldStore, InMemoryLedgerStore,
        InMemoryMappingStore, InMemoryPipelineStore, InMemoryProcessorMappingStore,
        ShadowJournalAdapter,
    };
    use cardswitch_core::{BankAccountMapping, MccBlockingRule, RulesEngine, TransactionLimitRule};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestFixture {
        state: ServiceState,
        card_id: Uuid,
        poor_card_id: Uuid,
    }

    /// Builds a service state with one active card mapped to "acc-1" (seeded
    /// with a $1000 balance) and a second card mapped to "acc-2" (seeded
    /// with only $10), a $500 transaction limit, and MCC 7995 blocked.
    async fn test_fixture() -> TestFixture {
        let cards: Arc<dyn CardStore> = Arc::new(InMemoryCardStore::new());
        let mappings: Arc<dyn cardswitch_core::MappingStore> = Arc::new(InMemoryMappingStore::new());
        let authorizations_concrete = Arc::new(InMemoryAuthorizationStore::new());
        let ledger_concrete = Arc::new(InMemoryLedgerStore::new());
        let unit_of_work: Arc<dyn cardswitch_core::PipelineUnitOfWork> = Arc::new(InMemoryPipelineStore::new(
            authorizations_concrete.clone(),
            ledger_concrete.clone(),
        ));
        let authorizations: Arc<dyn cardswitch_core::AuthorizationStore> = authorizations_concrete;
        let ledger: Arc<dyn LedgerStore> = ledger_concrete;
        let holds: Arc<dyn cardswitch_core::HoldStore> = Arc::new(InMemoryHoldStore::new());
        let shadow = ShadowJournalAdapter::new(holds);
        shadow.seed_balance("acc-1", Money::from_str_amount("1000.00", Currency::Usd).unwrap());
        shadow.seed_balance("acc-2", Money::from_str_amount("10.00", Currency::Usd).unwrap());
        let adapter: Arc<dyn BankAccountAdapter> = Arc::new(shadow);

        let mut card = Card::issue("Jane Doe", "4242", NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(), "client-1");
        card.activate().unwrap();
        let card_id = card.card_id;
        cards.save(card).await.unwrap();
        mappings
            .save(BankAccountMapping::new(card_id, "client-1", "acc-1", "shadow-journal", "system"))
            .await
            .unwrap();

        let mut poor_card = Card::issue("Poor Account", "1111", NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(), "client-2");
        poor_card.activate().unwrap();
        let poor_card_id = poor_card.card_id;
        cards.save(poor_card).await.unwrap();
        mappings
            .save(BankAccountMapping::new(poor_card_id, "client-2", "acc-2", "shadow-journal", "system"))
            .await
            .unwrap();

        let rules = RulesEngine::new(vec![
            Arc::new(TransactionLimitRule::new(Money::from_str_amount("500.00", Currency::Usd).unwrap())),
            Arc::new(MccBlockingRule::new(vec!["7995".to_string()])),
        ]);

        let authorize = Arc::new(AuthorizationPipeline::new(
            cards.clone(),
            mappings.clone(),
            authorizations.clone(),
            unit_of_work.clone(),
            rules,
            adapter.clone(),
        ));
        let settle = Arc::new(SettlementPipeline::new(
            authorizations.clone(),
            ledger.clone(),
            unit_of_work,
            adapter.clone(),
        ));
        let processor_mappings: Arc<dyn cardswitch_core::ProcessorMappingStore> =
            Arc::new(InMemoryProcessorMappingStore::new());
        let processors = vec![InboundProcessorAdapter::new(
            "test-processor",
            authorize.clone(),
            settle.clone(),
            processor_mappings,
        )];

        TestFixture {
            state: ServiceState {
                cards,
                ledger,
                adapter,
                authorize,
                settle,
                processors: Arc::new(processors),
            },
            card_id,
            poor_card_id,
        }
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn authorize_body(card_id: Uuid, amount: &str, idempotency_key: &str) -> Value {
        json!({
            "card_id": card_id,
            "amount": amount,
            "currency": "USD",
            "merchant_name": "Acme Goods",
            "merchant_category_code": "5812",
            "idempotency_key": idempotency_key,
        })
    }

    #[tokio::test]
    async fn health_endpoint_reports_shadow_journal_adapter() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["adapter_name"], "shadow-journal");
        assert_eq!(body["adapter_healthy"], true);
    }

    #[tokio::test]
    async fn authorization_under_limit_and_balance_is_approved() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, body) = post_json(
            &app,
            "/authorizations",
            authorize_body(fixture.card_id, "100.00", "idem-happy-path"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "APPROVED");
        assert!(body["decline_reason"].is_null());
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_returns_the_original_decision() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (_, first) = post_json(&app, "/authorizations", authorize_body(fixture.card_id, "100.00", "idem-dup")).await;
        let (_, second) = post_json(&app, "/authorizations", authorize_body(fixture.card_id, "999.00", "idem-dup")).await;

        assert_eq!(first["authorization_id"], second["authorization_id"]);
        assert_eq!(second["status"], "APPROVED");
    }

    #[tokio::test]
    async fn authorization_above_transaction_limit_is_declined() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, body) = post_json(
            &app,
            "/authorizations",
            authorize_body(fixture.card_id, "501.00", "idem-over-limit"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "DECLINED");
        assert!(body["decline_reason"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn authorization_against_blocked_mcc_is_declined() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let mut body = authorize_body(fixture.card_id, "20.00", "idem-mcc");
        body["merchant_category_code"] = json!("7995");

        let (status, body) = post_json(&app, "/authorizations", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "DECLINED");
    }

    #[tokio::test]
    async fn authorization_exceeding_account_balance_is_declined_insufficient_funds() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, body) = post_json(
            &app,
            "/authorizations",
            authorize_body(fixture.poor_card_id, "50.00", "idem-insufficient"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "DECLINED");
        assert_eq!(body["decline_reason"], "Insufficient funds");
    }

    #[tokio::test]
    async fn partial_clearing_credits_back_the_unclaimed_hold_amount() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (_, authorized) = post_json(
            &app,
            "/authorizations",
            authorize_body(fixture.card_id, "100.00", "idem-partial-clear"),
        )
        .await;
        let authorization_id = authorized["authorization_id"].as_str().unwrap();

        let clear_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/settlement/clear/{authorization_id}?amount=60.00&currency=USD"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(clear_response.status(), StatusCode::OK);

        let (_, entries) = get_json(&app, &format!("/ledger/entries?authorization_id={authorization_id}")).await;
        let entries = entries.as_array().unwrap();
        assert!(entries.iter().any(|e| e["transaction_type"] == "CLEARING_COMMIT"));
        assert!(entries.iter().any(|e| e["transaction_type"] == "AUTH_HOLD"));
    }

    #[tokio::test]
    async fn release_path_marks_authorization_released_and_appends_ledger_entry() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (_, authorized) = post_json(
            &app,
            "/authorizations",
            authorize_body(fixture.card_id, "75.00", "idem-release"),
        )
        .await;
        let authorization_id = authorized["authorization_id"].as_str().unwrap();

        let release_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/settlement/release/{authorization_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(release_response.status(), StatusCode::OK);

        let (_, entries) = get_json(&app, &format!("/ledger/entries?authorization_id={authorization_id}")).await;
        let entries = entries.as_array().unwrap();
        assert!(entries.iter().any(|e| e["transaction_type"] == "AUTH_RELEASE"));
    }

    #[tokio::test]
    async fn unknown_card_returns_not_found() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, _) = get_json(&app, &format!("/cards/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn card_lifecycle_create_activate_freeze() {
        let fixture = test_fixture().await;
        let app = build_router(fixture.state);

        let (status, created) = post_json(
            &app,
            "/cards",
            json!({
                "cardholder_name": "New Holder",
                "last4": "9999",
                "expiration_date": "2099-01-01",
                "owner_id": "client-3",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let card_id = created["card_id"].as_str().unwrap();

        let (status, activated) = post_json(&app, &format!("/cards/{card_id}/activate"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(activated["state"], "ACTIVE");

        let (status, frozen) = post_json(&app, &format!("/cards/{card_id}/freeze"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(frozen["state"], "FROZEN");
    }
}
