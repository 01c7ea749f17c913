//! JSON API surface.
//!
//! Endpoints:
//! - `POST /api/intent`                    — query to decision card
//! - `POST /api/approve/{activity_id}`    — approve and execute
//! - `POST /api/deny/{activity_id}`       — deny
//! - `GET  /api/policy` / `PUT /api/policy` — read / partially update policy
//! - `GET  /api/activities[/{id}]`        — audit trail, newest first
//! - `GET  /`                             — service banner

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus, PolicyCheck};
use arcpay_core::domain::intent::TransferIntent;
use arcpay_core::domain::policy::PolicyPatch;
use arcpay_core::domain::transaction::Transaction;
use arcpay_core::errors::WorkflowError;

use crate::workflow::{ActivityRecord, IntentOutcome, PaymentWorkflow};

#[derive(Clone)]
pub struct ApiState {
    workflow: Arc<PaymentWorkflow>,
}

pub fn router(workflow: Arc<PaymentWorkflow>) -> Router {
    Router::new()
        .route("/", get(service_banner))
        .route("/api/intent", post(process_intent))
        .route("/api/approve/{activity_id}", post(approve))
        .route("/api/deny/{activity_id}", post(deny))
        .route("/api/policy", get(get_policy).put(update_policy))
        .route("/api/activities", get(list_activities))
        .route("/api/activities/{activity_id}", get(get_activity))
        .with_state(ApiState { workflow })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IntentRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct NonTransactionResponse {
    message: String,
    is_transaction: bool,
}

#[derive(Debug, Serialize)]
struct IntentDecisionResponse {
    activity_id: String,
    structured_intent: TransferIntent,
    ai_reasoning: String,
    policy_checks: Vec<PolicyCheck>,
    status: ActivityStatus,
    is_valid: bool,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DenyResponse {
    message: String,
    activity_id: String,
}

#[derive(Debug, Serialize)]
struct ServiceBanner {
    message: &'static str,
    version: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ActivityRecordResponse {
    #[serde(flatten)]
    activity: Activity,
    transaction: Option<Transaction>,
}

#[derive(Debug, Serialize)]
struct ActivitiesResponse {
    activities: Vec<ActivityRecordResponse>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

impl From<ActivityRecord> for ActivityRecordResponse {
    fn from(record: ActivityRecord) -> Self {
        Self { activity: record.activity, transaction: record.transaction }
    }
}

fn error_response(workflow_error: WorkflowError) -> Response {
    let status_code = match &workflow_error {
        WorkflowError::ActivityNotFound(_) | WorkflowError::PolicyNotFound => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Locked(_) => StatusCode::CONFLICT,
        WorkflowError::InvalidState { .. } => StatusCode::BAD_REQUEST,
        WorkflowError::PolicyViolation(_) => StatusCode::FORBIDDEN,
        WorkflowError::Upstream(_) | WorkflowError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status_code == StatusCode::INTERNAL_SERVER_ERROR {
        error!(
            event_name = "api.request_failed",
            error_class = workflow_error.class(),
            error = %workflow_error,
            "request failed with server error"
        );
    }

    (status_code, Json(ApiError { error: workflow_error.to_string() })).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn service_banner() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        message: "arcpay API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

async fn process_intent(
    State(state): State<ApiState>,
    Json(request): Json<IntentRequest>,
) -> Response {
    match state.workflow.process_intent(&request.query).await {
        Ok(IntentOutcome::NotTransaction { message }) => {
            Json(NonTransactionResponse { message, is_transaction: false }).into_response()
        }
        Ok(IntentOutcome::Created(decision)) => Json(IntentDecisionResponse {
            activity_id: decision.activity.id.0.clone(),
            ai_reasoning: decision.activity.ai_reasoning.clone(),
            structured_intent: decision.activity.structured_intent.clone(),
            policy_checks: decision.validation.policy_checks,
            status: decision.activity.status,
            is_valid: decision.validation.is_valid,
            violations: decision.validation.violations,
        })
        .into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn approve(State(state): State<ApiState>, Path(activity_id): Path<String>) -> Response {
    match state.workflow.approve(&ActivityId(activity_id)).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn deny(State(state): State<ApiState>, Path(activity_id): Path<String>) -> Response {
    let id = ActivityId(activity_id);
    match state.workflow.deny(&id).await {
        Ok(()) => Json(DenyResponse {
            message: "Transaction denied".to_string(),
            activity_id: id.0,
        })
        .into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn get_policy(State(state): State<ApiState>) -> Response {
    match state.workflow.current_policy().await {
        Ok(policy) => Json(policy).into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn update_policy(
    State(state): State<ApiState>,
    Json(patch): Json<PolicyPatch>,
) -> Response {
    match state.workflow.update_policy(patch).await {
        Ok(policy) => Json(policy).into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn list_activities(State(state): State<ApiState>) -> Response {
    match state.workflow.list_activities().await {
        Ok(records) => Json(ActivitiesResponse {
            activities: records.into_iter().map(ActivityRecordResponse::from).collect(),
        })
        .into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

async fn get_activity(
    State(state): State<ApiState>,
    Path(activity_id): Path<String>,
) -> Response {
    match state.workflow.get_activity(&ActivityId(activity_id)).await {
        Ok(record) => Json(ActivityRecordResponse::from(record)).into_response(),
        Err(workflow_error) => error_response(workflow_error),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use arcpay_agent::{IntentExtractor, LlmClient};
    use arcpay_core::domain::activity::{Activity, ActivityId, ActivityStatus};
    use arcpay_core::domain::intent::TransferIntent;
    use arcpay_core::domain::transaction::TransferStatus;
    use arcpay_db::repositories::{
        ActivityRepository, InMemoryActivityRepository, InMemoryPolicyRepository,
        InMemoryTransactionRepository,
    };
    use arcpay_transfer::backend::{
        BackendError, TransferBackend, TransferReceipt, TransferStatusReport,
    };
    use arcpay_transfer::TransferExecutor;

    use crate::workflow::PaymentWorkflow;

    struct OfflineLlmClient;

    #[async_trait]
    impl LlmClient for OfflineLlmClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("model offline"))
        }
    }

    struct ConfirmingBackend;

    #[async_trait]
    impl TransferBackend for ConfirmingBackend {
        async fn create_transfer(
            &self,
            amount: Decimal,
            recipient: &str,
        ) -> Result<TransferReceipt, BackendError> {
            Ok(TransferReceipt {
                tx_hash: "0xconfirmed".to_string(),
                status: TransferStatus::Confirmed,
                amount,
                recipient: recipient.to_string(),
                timed_out: false,
            })
        }

        async fn transfer_status(
            &self,
            tx_hash: &str,
        ) -> Result<TransferStatusReport, BackendError> {
            Ok(TransferStatusReport {
                tx_hash: tx_hash.to_string(),
                status: TransferStatus::Confirmed,
                confirmations: 12,
            })
        }
    }

    fn test_router() -> (Router, Arc<InMemoryActivityRepository>) {
        let activities = Arc::new(InMemoryActivityRepository::default());
        let workflow = PaymentWorkflow::new(
            Arc::new(InMemoryPolicyRepository::default()),
            activities.clone(),
            Arc::new(InMemoryTransactionRepository::default()),
            IntentExtractor::new(Arc::new(OfflineLlmClient)),
            TransferExecutor::new(Arc::new(ConfirmingBackend), Duration::from_secs(30)),
        );

        (super::router(Arc::new(workflow)), activities)
    }

    async fn send_json(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(value) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .expect("request"),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).expect("request"),
        };

        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };

        (status, value)
    }

    /// Most endpoints need a policy row; the banner endpoint does not.
    async fn seed_policy(router: &Router) {
        let (status, _) = send_json(router, "GET", "/api/policy", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn banner_reports_running_service() {
        let (router, _) = test_router();

        let (status, body) = send_json(&router, "GET", "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "arcpay API");
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn get_policy_seeds_documented_default() {
        let (router, _) = test_router();

        let (status, body) = send_json(&router, "GET", "/api/policy", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allow_list"], json!(["Stripe", "Circle", "Amazon"]));
        assert_eq!(body["block_list"], json!([]));
    }

    #[tokio::test]
    async fn put_policy_overwrites_only_supplied_fields() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (status, body) = send_json(
            &router,
            "PUT",
            "/api/policy",
            Some(json!({"max_tx_amount": 250})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["max_tx_amount"], "250");
        assert_eq!(body["allow_list"], json!(["Stripe", "Circle", "Amazon"]));
    }

    #[tokio::test]
    async fn intent_returns_decision_card() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (status, body) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $50 to Stripe"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending_approval");
        assert_eq!(body["is_valid"], true);
        assert_eq!(body["structured_intent"]["recipientName"], "Stripe");
        assert!(body["activity_id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body["policy_checks"].as_array().is_some_and(|checks| !checks.is_empty()));
    }

    #[tokio::test]
    async fn intent_reports_non_transactional_queries() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (status, body) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "how are you today?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_transaction"], false);
        assert!(body["message"].as_str().is_some_and(|m| m.contains("specify an amount")));
    }

    #[tokio::test]
    async fn approve_happy_path_then_replay_is_bad_request() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (_, decision) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $50 to Stripe"})),
        )
        .await;
        let activity_id = decision["activity_id"].as_str().expect("activity id").to_string();

        let (status, body) =
            send_json(&router, "POST", &format!("/api/approve/{activity_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tx_hash"], "0xconfirmed");
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["explorer_url"], "https://arc-explorer.com/tx/0xconfirmed");
        assert_eq!(body["proof_data"]["confirmations"], 12);

        let (replay_status, replay_body) =
            send_json(&router, "POST", &format!("/api/approve/{activity_id}"), None).await;
        assert_eq!(replay_status, StatusCode::BAD_REQUEST);
        assert!(replay_body["error"]
            .as_str()
            .is_some_and(|error| error.contains("executed")));
    }

    #[tokio::test]
    async fn approve_unknown_activity_is_not_found() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (status, _) = send_json(&router, "POST", "/api/approve/missing", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approve_locked_activity_is_conflict() {
        let (router, activities) = test_router();
        seed_policy(&router).await;

        activities
            .insert(Activity {
                id: ActivityId("act-locked".to_string()),
                user_query: "Send $50 to Stripe".to_string(),
                structured_intent: TransferIntent {
                    amount: Decimal::new(50, 0),
                    currency: "USDC".to_string(),
                    recipient: "0xabcd1234...1234".to_string(),
                    recipient_name: "Stripe".to_string(),
                    reasoning: String::new(),
                },
                ai_reasoning: String::new(),
                status: ActivityStatus::PendingApproval,
                policy_checks: Vec::new(),
                locked: true,
                locked_at: Some(Utc::now()),
                created_at: Utc::now(),
            })
            .await
            .expect("insert locked activity");

        let (status, body) = send_json(&router, "POST", "/api/approve/act-locked", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]
            .as_str()
            .is_some_and(|error| error.contains("already being processed")));
    }

    #[tokio::test]
    async fn approve_after_policy_tightening_is_forbidden() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (_, decision) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $500 to Stripe"})),
        )
        .await;
        let activity_id = decision["activity_id"].as_str().expect("activity id").to_string();

        let (put_status, _) =
            send_json(&router, "PUT", "/api/policy", Some(json!({"max_tx_amount": 100}))).await;
        assert_eq!(put_status, StatusCode::OK);

        let (status, body) =
            send_json(&router, "POST", &format!("/api/approve/{activity_id}"), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"]
            .as_str()
            .is_some_and(|error| error.contains("exceeds max transaction limit")));
    }

    #[tokio::test]
    async fn deny_flags_rejection_and_missing_activity_is_not_found() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (_, decision) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $1500 to dev"})),
        )
        .await;
        let activity_id = decision["activity_id"].as_str().expect("activity id").to_string();
        assert_eq!(decision["status"], "flagged_by_policy");

        let (status, body) =
            send_json(&router, "POST", &format!("/api/deny/{activity_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Transaction denied");
        assert_eq!(body["activity_id"], activity_id.as_str());

        let (missing_status, _) = send_json(&router, "POST", "/api/deny/missing", None).await;
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn activities_listing_joins_transactions_newest_first() {
        let (router, _) = test_router();
        seed_policy(&router).await;

        let (_, first) = send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $50 to Stripe"})),
        )
        .await;
        let first_id = first["activity_id"].as_str().expect("activity id").to_string();
        send_json(&router, "POST", &format!("/api/approve/{first_id}"), None).await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        send_json(
            &router,
            "POST",
            "/api/intent",
            Some(json!({"query": "Send $20 to Circle"})),
        )
        .await;

        let (status, body) = send_json(&router, "GET", "/api/activities", None).await;
        assert_eq!(status, StatusCode::OK);

        let listed = body["activities"].as_array().expect("activities array");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["structured_intent"]["recipientName"], "Circle");
        assert!(listed[0]["transaction"].is_null());
        assert_eq!(listed[1]["id"], first_id.as_str());
        assert_eq!(listed[1]["transaction"]["tx_hash"], "0xconfirmed");

        let (single_status, single) =
            send_json(&router, "GET", &format!("/api/activities/{first_id}"), None).await;
        assert_eq!(single_status, StatusCode::OK);
        assert_eq!(single["status"], "executed");
        assert_eq!(single["locked"], false);

        let (missing_status, _) =
            send_json(&router, "GET", "/api/activities/missing", None).await;
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
    }
}
