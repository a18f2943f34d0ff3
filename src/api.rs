// 🌐 REST API - Pricing, access checks, users and budget math over HTTP
//
// The caller's identity arrives in the `x-user-id` header (the identity
// provider sits in front of this service). No header means no identity.

use crate::access::{resolve_access, AccessDecision, GuardOutcome, RestrictedAccessView};
use crate::budget::{
    adjust_category, total_limit, validate_categories, Budget, BudgetCategory, BudgetPeriod, BudgetSummary,
};
use crate::db::SqliteStore;
use crate::plans::{Feature, PlanCatalog};
use crate::pricing::{pricing_cards, BillingCycle, PricingCard};
use crate::session::split_display_name;
use crate::store::{PlanStore, UserDocument};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const USER_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    catalog: Arc<PlanCatalog>,
    default_plan: String,
}

impl AppState {
    pub fn new(store: SqliteStore, catalog: PlanCatalog, default_plan: &str) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            catalog: Arc::new(catalog),
            default_plan: default_plan.to_string(),
        }
    }

    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn reply<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiResponse::ok(data))).into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

fn internal(context: &str, e: anyhow::Error) -> Response {
    error!(error = %e, "{}", context);
    fail(StatusCode::INTERNAL_SERVER_ERROR, context)
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Deserialize)]
struct PricingQuery {
    #[serde(default)]
    cycle: BillingCycle,
    current: Option<String>,
}

#[derive(Serialize)]
struct AccessResponse {
    feature: Feature,
    decision: AccessDecision,
    outcome: GuardOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    restricted_view: Option<RestrictedAccessView>,
}

#[derive(Deserialize)]
struct SignUpRequest {
    uid: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct PlanChangeRequest {
    plan: String,
}

#[derive(Deserialize)]
struct AdjustRequest {
    categories: Vec<BudgetCategory>,
    target: String,
    new_limit: Decimal,
    #[serde(default = "default_auto_adjust")]
    auto_adjust: bool,
}

fn default_auto_adjust() -> bool {
    true
}

#[derive(Serialize)]
struct AdjustResponse {
    categories: Vec<BudgetCategory>,
    total: Decimal,
}

#[derive(Deserialize)]
struct NewBudgetQuery {
    #[serde(default)]
    period: BudgetPeriod,
    start: Option<NaiveDate>,
}

#[derive(Serialize)]
struct BudgetResponse {
    budget: Budget,
    summary: BudgetSummary,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    reply(StatusCode::OK, "OK")
}

/// GET /api/plans?cycle=annual&current=pro
async fn get_pricing(State(state): State<AppState>, Query(query): Query<PricingQuery>) -> Response {
    let cards: Vec<PricingCard> = pricing_cards(&state.catalog, query.current.as_deref(), query.cycle);
    reply(StatusCode::OK, cards)
}

/// GET /api/access/:feature
async fn check_access(
    State(state): State<AppState>,
    Path(feature): Path<String>,
    headers: HeaderMap,
) -> Response {
    let feature: Feature = match feature.parse() {
        Ok(f) => f,
        Err(e) => return fail(StatusCode::NOT_FOUND, format!("{}", e)),
    };

    let uid = headers.get(USER_HEADER).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty());

    let decision = {
        let store = state.store();
        resolve_access(&state.catalog, uid, &*store, feature)
    };
    let outcome = decision.outcome();
    let restricted_view = match outcome {
        GuardOutcome::Render => None,
        _ => Some(RestrictedAccessView::new(&state.catalog, feature)),
    };

    reply(
        StatusCode::OK,
        AccessResponse {
            feature,
            decision,
            outcome,
            restricted_view,
        },
    )
}

/// GET /api/users/:uid
async fn get_user(State(state): State<AppState>, Path(uid): Path<String>) -> Response {
    let result = state.store().get_user(&uid);
    match result {
        Ok(Some(doc)) => reply(StatusCode::OK, doc),
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("no user {}", uid)),
        Err(e) => internal("Error reading user", e),
    }
}

/// POST /api/users - email sign-up, default plan
async fn sign_up(State(state): State<AppState>, Json(req): Json<SignUpRequest>) -> Response {
    if req.uid.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "uid is required");
    }

    let (name, last_name) = split_display_name(&req.display_name);
    let doc = UserDocument::new(&state.default_plan, &name, &last_name, &req.email);

    let result = state.store().create_user(&req.uid, &doc);
    match result {
        Ok(true) => reply(StatusCode::CREATED, doc),
        Ok(false) => fail(StatusCode::CONFLICT, format!("user {} already exists", req.uid)),
        Err(e) => internal("Error creating user", e),
    }
}

/// PUT /api/users/:uid/plan
async fn change_plan(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<PlanChangeRequest>,
) -> Response {
    if !state.catalog.contains(&req.plan) {
        return fail(StatusCode::BAD_REQUEST, format!("unknown plan '{}'", req.plan));
    }

    let store = state.store();
    match store.get_user(&uid) {
        Ok(Some(_)) => {}
        Ok(None) => return fail(StatusCode::NOT_FOUND, format!("no user {}", uid)),
        Err(e) => return internal("Error reading user", e),
    }

    match store.set_user_plan(&uid, &req.plan).and_then(|_| store.get_user(&uid)) {
        Ok(Some(doc)) => reply(StatusCode::OK, doc),
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("no user {}", uid)),
        Err(e) => internal("Error changing plan", e),
    }
}

/// POST /api/budgets/adjust
async fn adjust_budget(Json(req): Json<AdjustRequest>) -> Response {
    if let Err(e) = validate_categories(&req.categories) {
        return fail(StatusCode::BAD_REQUEST, e.to_string());
    }

    let categories = adjust_category(&req.categories, &req.target, req.new_limit, req.auto_adjust);
    let total = total_limit(&categories);
    reply(StatusCode::OK, AdjustResponse { categories, total })
}

/// GET /api/budgets/new?period=weekly&start=2024-05-15
async fn new_budget(Query(query): Query<NewBudgetQuery>) -> Response {
    let start = query.start.unwrap_or_else(|| Utc::now().date_naive());
    let budget = Budget::new(query.period, start);
    let summary = budget.summary();
    reply(StatusCode::OK, BudgetResponse { budget, summary })
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/plans", get(get_pricing))
        .route("/access/:feature", get(check_access))
        .route("/users", post(sign_up))
        .route("/users/:uid", get(get_user))
        .route("/users/:uid/plan", put(change_plan))
        .route("/budgets/adjust", post(adjust_budget))
        .route("/budgets/new", get(new_budget))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed_plans;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store = SqliteStore::open_in_memory().unwrap();
        let catalog = PlanCatalog::standard();
        seed_plans(&store, &catalog).unwrap();
        store
            .create_user("u-pro", &UserDocument::new("pro", "Ada", "Lovelace", "ada@example.com"))
            .unwrap();
        store.create_user("u-free", &UserDocument::new("free", "Bob", "", "")).unwrap();
        router(AppState::new(store, catalog, "free"))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_as(uri: &str, uid: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(uid) = uid {
            builder = builder.header(USER_HEADER, uid);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_app(), get_as("/api/health", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_access_granted() {
        let (status, body) = send(test_app(), get_as("/api/access/data_export", Some("u-pro"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["decision"]["decision"], "granted");
        assert_eq!(body["data"]["outcome"]["action"], "render");
        assert!(body["data"].get("restricted_view").is_none());
    }

    #[tokio::test]
    async fn test_access_denied_in_place() {
        let (_, body) = send(test_app(), get_as("/api/access/data_export", Some("u-free"))).await;

        assert_eq!(body["data"]["decision"]["decision"], "denied");
        assert_eq!(body["data"]["outcome"]["action"], "restricted_in_place");
        assert_eq!(body["data"]["restricted_view"]["suggested_plan"], "Pro");
    }

    #[tokio::test]
    async fn test_access_without_identity_redirects_to_auth() {
        let (_, body) = send(test_app(), get_as("/api/access/budgets", None)).await;

        assert_eq!(body["data"]["outcome"], json!({"action": "redirect", "route": "auth"}));
    }

    #[tokio::test]
    async fn test_access_unknown_feature() {
        let (status, body) = send(test_app(), get_as("/api/access/teleport", Some("u-pro"))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_pricing_labels_for_current_plan() {
        let (_, body) = send(test_app(), get_as("/api/plans?cycle=annual&current=pro", None)).await;
        let cards = body["data"].as_array().unwrap();

        assert_eq!(cards.len(), 4);
        assert_eq!(cards[1]["action"], "downgrade");
        assert_eq!(cards[2]["action_label"], "Current Plan");
        assert_eq!(cards[3]["action"], "upgrade");
    }

    #[tokio::test]
    async fn test_sign_up_and_conflict() {
        let app = test_app();
        let req = json!({"uid": "u-new", "email": "c@example.com", "display_name": "Cy Young"});

        let (status, body) = send(app.clone(), json_request("POST", "/api/users", req.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["plan"], "free");
        assert_eq!(body["data"]["lastName"], "Young");

        let (status, _) = send(app, json_request("POST", "/api/users", req)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_change_plan_then_access() {
        let app = test_app();

        let (status, _) = send(
            app.clone(),
            json_request("PUT", "/api/users/u-free/plan", json!({"plan": "starter"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(app, get_as("/api/access/investment_tracking", Some("u-free"))).await;
        assert_eq!(body["data"]["decision"]["decision"], "granted");
    }

    #[tokio::test]
    async fn test_change_to_unknown_plan_rejected() {
        let (status, _) = send(
            test_app(),
            json_request("PUT", "/api/users/u-free/plan", json!({"plan": "enterprise"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_adjust_budget() {
        let req = json!({
            "categories": [
                {"label": "food", "limit": "500"},
                {"label": "housing", "limit": "1000"}
            ],
            "target": "food",
            "new_limit": "600",
            "auto_adjust": true
        });

        let (status, body) = send(test_app(), json_request("POST", "/api/budgets/adjust", req)).await;

        assert_eq!(status, StatusCode::OK);
        let housing: Decimal = body["data"]["categories"][1]["limit"].as_str().unwrap().parse().unwrap();
        assert_eq!(housing, Decimal::from(900));
    }

    #[tokio::test]
    async fn test_adjust_budget_rejects_broken_categories() {
        let negative = json!({
            "categories": [
                {"label": "a", "limit": "0"},
                {"label": "b", "limit": "50"},
                {"label": "c", "limit": "-100"}
            ],
            "target": "a",
            "new_limit": "10"
        });
        let (status, body) = send(test_app(), json_request("POST", "/api/budgets/adjust", negative)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "category 'c' has a negative limit");

        let duplicate = json!({
            "categories": [
                {"label": "food", "limit": "500"},
                {"label": "food", "limit": "100"}
            ],
            "target": "food",
            "new_limit": "600"
        });
        let (status, _) = send(test_app(), json_request("POST", "/api/budgets/adjust", duplicate)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_new_weekly_budget() {
        let (_, body) = send(test_app(), get_as("/api/budgets/new?period=weekly&start=2024-05-15", None)).await;

        assert_eq!(body["data"]["budget"]["start_date"], "2024-05-12");
        assert_eq!(body["data"]["budget"]["end_date"], "2024-05-25");
    }
}
