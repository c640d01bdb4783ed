//! HTTP boundary tests: the thin handlers and the typed error mapping.
//!
//! Ignored by default; run with `DATABASE_URL` set.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{connect_db, test_custody, unique_username, FakeChain};
use ticketchain::accounts::AccountService;
use ticketchain::chain::ChainGateway;
use ticketchain::indexer::EventIndexer;
use ticketchain::infra::{PgEventStore, PgListingStore, PgTicketStore};
use ticketchain::issuance::TicketIssuanceService;
use ticketchain::marketplace::MarketplaceService;
use ticketchain::server::AppState;

async fn test_app(pool: sqlx::PgPool) -> axum::Router {
    ticketchain::migrations::run_postgres(&pool).await.unwrap();

    let chain = Arc::new(FakeChain::new());
    let gateway: Arc<dyn ChainGateway> = chain;
    let custody = Arc::new(test_custody());

    let state = AppState {
        accounts: Arc::new(AccountService::new(pool.clone(), custody.clone())),
        issuance: Arc::new(TicketIssuanceService::new(
            pool.clone(),
            gateway.clone(),
            custody.clone(),
        )),
        marketplace: Arc::new(MarketplaceService::new(
            pool.clone(),
            gateway.clone(),
            custody,
        )),
        indexer: Arc::new(EventIndexer::new(pool.clone(), gateway, 9_900, 0)),
        events: PgEventStore::new(pool.clone()),
        tickets: PgTicketStore::new(pool.clone()),
        listings: PgListingStore::new(pool),
    };

    ticketchain::server::build_router()
        .unwrap()
        .with_state(state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn health_is_always_green() {
    let Some(pool) = connect_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let app = test_app(pool).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn registration_returns_wallet_but_never_key_material() {
    let Some(pool) = connect_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let app = test_app(pool).await;

    let username = unique_username("api-user");
    let payload = serde_json::json!({
        "username": username,
        "password_hash": "argon2-test-hash",
    });

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/users")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], username.as_str());
    assert!(body["wallet_address"].as_str().unwrap().starts_with("0x"));
    assert!(body.get("encrypted_private_key").is_none());
    assert!(body.get("password_hash").is_none());

    // The stored record is fetchable and equally free of secrets.
    let user_id = body["user_id"].as_i64().unwrap();
    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::GET)
            .uri(format!("/api/users/{user_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("encrypted_private_key").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn missing_resources_map_to_not_found_codes() {
    let Some(pool) = connect_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let app = test_app(pool).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::GET)
            .uri("/api/users/999999999")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn invalid_wallet_mode_is_a_bad_request() {
    let Some(pool) = connect_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let app = test_app(pool).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::PUT)
            .uri("/api/users/1/wallet-mode")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"wallet_mode": "hardware"}"#))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_BODY");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn sync_trigger_is_accepted() {
    let Some(pool) = connect_db().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let app = test_app(pool).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/internal/sync")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "sync started");
}
