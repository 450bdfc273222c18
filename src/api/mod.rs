mod analytics;
pub mod auth;
mod customers;
pub mod error;
mod finance;
mod inventory;
mod notifications;
mod profiles;
mod quality;
pub mod rate_limit;
mod schedule;
mod team;
mod validation;
mod work_orders;

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public, stricter rate limit)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/setup-status", get(auth::setup_status))
        .route("/setup", post(auth::setup))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Admin-only routes, nested under the protected API
    let admin_routes = Router::new()
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles", post(profiles::create_profile))
        .route("/profiles/:id", delete(profiles::delete_profile))
        .route("/profiles/:id/role", put(profiles::update_profile_role))
        .route("/notifications", post(notifications::create_notification))
        .layer(middleware::from_fn(auth::require_admin));

    // Protected API routes
    let api_routes = Router::new()
        // Session
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/me", put(auth::update_me))
        .route("/me/password", put(auth::change_password))
        // Customers
        .route("/customers", get(customers::list_customers))
        .route("/customers", post(customers::create_customer))
        .route("/customers/:id", get(customers::get_customer))
        .route("/customers/:id", put(customers::update_customer))
        .route("/customers/:id", delete(customers::delete_customer))
        .route("/customers/:id/work-orders", get(customers::get_customer_work_orders))
        // Work orders
        .route("/work-orders", get(work_orders::list_work_orders))
        .route("/work-orders", post(work_orders::create_work_order))
        .route("/work-orders/:id", get(work_orders::get_work_order))
        .route("/work-orders/:id", put(work_orders::update_work_order))
        .route("/work-orders/:id", delete(work_orders::delete_work_order))
        .route("/work-orders/:id/status", put(work_orders::update_work_order_status))
        // Team
        .route("/team", get(team::list_team_members))
        .route("/team", post(team::create_team_member))
        .route("/team/workload", get(team::team_workload))
        .route("/team/:id", get(team::get_team_member))
        .route("/team/:id", put(team::update_team_member))
        .route("/team/:id", delete(team::delete_team_member))
        // Schedule
        .route("/schedule", get(schedule::list_schedule))
        .route("/schedule", post(schedule::create_schedule_item))
        .route("/schedule/:id", get(schedule::get_schedule_item))
        .route("/schedule/:id", put(schedule::update_schedule_item))
        .route("/schedule/:id", delete(schedule::delete_schedule_item))
        // Quality control
        .route("/quality/standards", get(quality::list_standards))
        .route("/quality/standards", post(quality::create_standard))
        .route("/quality/standards/:id", get(quality::get_standard))
        .route("/quality/standards/:id", put(quality::update_standard))
        .route("/quality/standards/:id", delete(quality::delete_standard))
        .route("/quality/checks", get(quality::list_checks))
        .route("/quality/checks", post(quality::create_check))
        .route("/quality/checks/:id", get(quality::get_check))
        .route("/quality/checks/:id", put(quality::update_check))
        .route("/quality/checks/:id", delete(quality::delete_check))
        .route("/quality/summary", get(quality::quality_summary))
        // Inventory
        .route("/inventory", get(inventory::list_inventory))
        .route("/inventory", post(inventory::create_inventory_item))
        .route("/inventory/summary", get(inventory::inventory_summary))
        .route("/inventory/:id", get(inventory::get_inventory_item))
        .route("/inventory/:id", put(inventory::update_inventory_item))
        .route("/inventory/:id", delete(inventory::delete_inventory_item))
        .route("/inventory/:id/adjust", post(inventory::adjust_stock))
        // Finance
        .route("/finance/transactions", get(finance::list_transactions))
        .route("/finance/transactions", post(finance::create_transaction))
        .route("/finance/transactions/:id", get(finance::get_transaction))
        .route("/finance/transactions/:id", put(finance::update_transaction))
        .route("/finance/transactions/:id", delete(finance::delete_transaction))
        .route("/finance/summary", get(finance::get_financial_summary))
        .route("/finance/export", get(finance::export_finance))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/notifications/:id", delete(notifications::delete_notification))
        // Analytics
        .route("/analytics/dashboard", get(analytics::get_dashboard))
        .route("/analytics/metrics", get(analytics::list_metrics))
        .route("/analytics/metrics/:name", get(analytics::get_metric))
        .nest("/admin", admin_routes)
        // Protected by auth, rate limited before auth runs
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Same-origin only unless origins are configured; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: any origin allowed");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(methods)
        .allow_headers(Any)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::init_memory;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

    async fn app_with(config: Config) -> Router {
        let db = init_memory().await.unwrap();
        create_router(Arc::new(AppState::new(config, db)))
    }

    async fn test_app() -> Router {
        let mut config = Config::default();
        config.auth.admin_token = ADMIN_TOKEN.to_string();
        config.rate_limit.enabled = false;
        app_with(config).await
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_profile(app: &Router, email: &str, role: &str) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/api/admin/profiles",
            Some(ADMIN_TOKEN),
            Some(json!({
                "email": email,
                "password": "password123",
                "fullName": email,
                "role": role
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/api/customers", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _) = send(&app, "GET", "/api/customers", Some("wrong"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_setup_then_login_flow() {
        let app = test_app().await;

        let (_, body) = send(&app, "GET", "/api/auth/setup-status", None, None).await;
        assert_eq!(body["needsSetup"], true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/setup",
            None,
            Some(json!({ "email": "owner@example.com", "password": "password123", "fullName": "Owner" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["role"], "admin");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/setup",
            None,
            Some(json!({ "email": "second@example.com", "password": "password123", "fullName": "Second" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "owner@example.com");
        assert!(body.get("passwordHash").is_none());

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "owner@example.com", "password": "wrong-pass1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid email or password");

        let (status, _) = send(&app, "POST", "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_are_role_gated() {
        let app = test_app().await;
        create_profile(&app, "staff@example.com", "staff").await;
        let staff = login(&app, "staff@example.com", "password123").await;

        let (status, body) = send(&app, "GET", "/api/admin/profiles", Some(&staff), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");

        let (status, _) = send(&app, "GET", "/api/customers", Some(&staff), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self() {
        let app = test_app().await;
        let id = create_profile(&app, "boss@example.com", "admin").await;
        let boss = login(&app, "boss@example.com", "password123").await;

        let uri = format!("/api/admin/profiles/{}/role", id);
        let (status, _) = send(&app, "PUT", &uri, Some(&boss), Some(json!({ "role": "staff" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/profiles/{}", id);
        let (status, _) = send(&app, "DELETE", &uri, Some(&boss), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_customer_crud_and_validation() {
        let app = test_app().await;
        let token = Some(ADMIN_TOKEN);

        let (status, body) = send(&app, "POST", "/api/customers", token, Some(json!({ "name": " ", "email": "nope" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["name"].is_array());
        assert!(body["error"]["details"]["email"].is_array());

        let (status, body) = send(&app, "POST", "/api/customers", token, Some(json!({ "name": "Acme", "company": "Acme Ltd" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        let uri = format!("/api/customers/{}", id);
        let (status, body) = send(&app, "PUT", &uri, token, Some(json!({ "company": "" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Acme");
        assert!(body["company"].is_null());

        let (status, _) = send(&app, "DELETE", &uri, token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, "GET", &uri, token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_work_order_references_and_status() {
        let app = test_app().await;
        let token = Some(ADMIN_TOKEN);

        let (status, body) = send(&app, "POST", "/api/work-orders", token, Some(json!({ "title": "Fix", "customerId": 999 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["customerId"].is_array());

        let (status, body) = send(&app, "POST", "/api/work-orders", token, Some(json!({ "title": "Fix", "estimatedCost": -1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["estimatedCost"].is_array());

        let (_, body) = send(&app, "POST", "/api/work-orders", token, Some(json!({ "title": "Fix" }))).await;
        let uri = format!("/api/work-orders/{}/status", body["id"].as_i64().unwrap());

        let (_, body) = send(&app, "PUT", &uri, token, Some(json!({ "status": "completed" }))).await;
        assert_eq!(body["status"], "completed");
        assert!(body["completedAt"].is_string());

        let (_, body) = send(&app, "PUT", &uri, token, Some(json!({ "status": "in-progress" }))).await;
        assert!(body["completedAt"].is_null());
    }

    #[tokio::test]
    async fn test_schedule_rejects_inverted_range() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/schedule",
            Some(ADMIN_TOKEN),
            Some(json!({
                "title": "Visit",
                "startTime": "2024-03-01T10:00:00Z",
                "endTime": "2024-03-01T09:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["endTime"].is_array());
    }

    #[tokio::test]
    async fn test_stock_adjustment_and_low_stock_alert() {
        let app = test_app().await;
        let manager_id = create_profile(&app, "manager@example.com", "manager").await;
        let manager = login(&app, "manager@example.com", "password123").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/inventory",
            Some(ADMIN_TOKEN),
            Some(json!({ "name": "Valve", "sku": "VLV-1", "currentStock": 10, "minStock": 3, "unitPrice": 2.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stockStatus"], "good");
        let uri = format!("/api/inventory/{}/adjust", body["id"].as_i64().unwrap());

        let (status, _) = send(&app, "POST", &uri, Some(ADMIN_TOKEN), Some(json!({ "delta": -11 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", &uri, Some(ADMIN_TOKEN), Some(json!({ "delta": -8 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStock"], 2);
        assert_eq!(body["stockStatus"], "low");

        let (_, body) = send(&app, "GET", "/api/notifications", Some(&manager), None).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["kind"], "warning");
        assert_eq!(list[0]["userId"], manager_id);
    }

    #[tokio::test]
    async fn test_extreme_stock_delta_leaves_item_readable() {
        let app = test_app().await;
        let (_, body) = send(
            &app,
            "POST",
            "/api/inventory",
            Some(ADMIN_TOKEN),
            Some(json!({ "name": "Bolt", "sku": "BLT-1", "currentStock": 10, "minStock": 1, "unitPrice": 0.2 })),
        )
        .await;
        let item_uri = format!("/api/inventory/{}", body["id"].as_i64().unwrap());
        let adjust_uri = format!("{}/adjust", item_uri);

        for delta in [i64::MAX, i64::MIN, crate::db::MAX_STOCK_LEVEL] {
            let (status, body) =
                send(&app, "POST", &adjust_uri, Some(ADMIN_TOKEN), Some(json!({ "delta": delta }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "delta {}", delta);
            assert!(body["error"]["details"]["delta"].is_array());
        }

        let (status, body) = send(&app, "GET", &item_uri, Some(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStock"], 10);

        let (status, body) = send(
            &app,
            "PUT",
            &item_uri,
            Some(ADMIN_TOKEN),
            Some(json!({ "currentStock": crate::db::MAX_STOCK_LEVEL + 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["currentStock"].is_array());
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_does_not_reset_login_limit() {
        let mut config = Config::default();
        config.auth.admin_token = ADMIN_TOKEN.to_string();
        config.rate_limit.auth_requests_per_window = 3;
        let app = app_with(config).await;

        let mut statuses = Vec::new();
        for i in 0..4 {
            let request = Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "nobody@example.com", "password": "password123" }).to_string(),
                ))
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses[..3], [StatusCode::UNAUTHORIZED; 3]);
        assert_eq!(statuses[3], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_notifications_are_private() {
        let app = test_app().await;
        let alice_id = create_profile(&app, "alice@example.com", "staff").await;
        create_profile(&app, "bob@example.com", "staff").await;
        let alice = login(&app, "alice@example.com", "password123").await;
        let bob = login(&app, "bob@example.com", "password123").await;

        send(
            &app,
            "POST",
            "/api/admin/notifications",
            Some(ADMIN_TOKEN),
            Some(json!({ "userId": alice_id, "title": "Hi", "message": "Just you" })),
        )
        .await;

        let (_, body) = send(&app, "GET", "/api/notifications", Some(&alice), None).await;
        let id = body[0]["id"].as_i64().unwrap();

        let uri = format!("/api/notifications/{}/read", id);
        let (status, _) = send(&app, "POST", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);

        let (_, body) = send(&app, "GET", "/api/notifications/unread-count", Some(&alice), None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_finance_export_is_attachment() {
        let app = test_app().await;
        send(
            &app,
            "POST",
            "/api/finance/transactions",
            Some(ADMIN_TOKEN),
            Some(json!({ "kind": "revenue", "category": "services", "amount": 120, "transactionDate": "2024-03-01" })),
        )
        .await;

        let request = Request::builder()
            .uri("/api/finance/export?format=csv&fields=kind,amount")
            .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"transactions-"));
        assert!(disposition.ends_with(".csv\""));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text, "kind,amount\nrevenue,120.0\n");

        let (status, body) = send(&app, "GET", "/api/finance/export?fields=secret", Some(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["fields"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_metric_is_not_found() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/api/analytics/metrics/revenue", Some(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changePercent"], 0.0);

        let (status, _) = send(&app, "GET", "/api/analytics/metrics/profit", Some(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
