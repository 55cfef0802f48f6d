mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use yalp_api::auth::{otp::otp_key, TokenIssuer};
use yalp_api::cache::{Cache, MokaCache};
use yalp_api::config::AppConfig;
use yalp_api::database::DatabaseManager;
use yalp_api::mail;
use yalp_api::metrics::{HttpMetrics, METRICS_PREFIX};
use yalp_api::policy::PolicyEnforcer;
use yalp_api::router;
use yalp_api::state::AppStateInner;
use yalp_api::usecase::UseCase;

struct TestServer {
    base_url: String,
    cache: Arc<MokaCache>,
}

/// Serves the real router on an ephemeral port, backed by Postgres.
async fn spawn_server(db: DatabaseManager) -> Result<TestServer> {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-secret".to_string();

    let cache = Arc::new(MokaCache::new(config.cache.max_entries));
    let state = Arc::new(AppStateInner {
        usecase: UseCase::postgres(db),
        cache: cache.clone(),
        mailer: mail::from_config(&config.mail)?,
        policy: Arc::new(PolicyEnforcer::load("config/policy.yaml").await?),
        tokens: TokenIssuer::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)?,
        metrics: HttpMetrics::new(METRICS_PREFIX)?,
        config,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.context("failed to bind")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let app = router::app(state).into_make_service_with_connect_info::<SocketAddr>();
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer { base_url: format!("http://{}", addr), cache })
}

#[tokio::test]
async fn register_verify_login_logout() -> Result<()> {
    let Some(db) = common::database().await? else { return Ok(()) };
    let server = spawn_server(db).await?;
    let client = reqwest::Client::new();
    let email = common::unique_email("flow");

    let res = client
        .post(format!("{}/v1/auth/register", server.base_url))
        .json(&json!({"full_name": "Flow Test", "email": email, "password": "flow-password"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // inverify accounts cannot log in yet
    let res = client
        .post(format!("{}/v1/auth/login", server.base_url))
        .json(&json!({"email": email, "password": "flow-password", "platform": "web"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let otp = server.cache.get(&otp_key(&email)).await.context("otp missing from cache")?;
    let res = client
        .post(format!("{}/v1/auth/verify-email", server.base_url))
        .header("x-forwarded-for", "203.0.113.7")
        .json(&json!({"email": email, "otp": otp, "platform": "web"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let payload = res.json::<Value>().await?;
    assert_eq!(payload["data"]["user"]["status"], "active");
    assert_eq!(payload["data"]["session"]["ip_address"], "203.0.113.7");

    let res = client
        .post(format!("{}/v1/auth/login", server.base_url))
        .json(&json!({"email": email, "password": "flow-password", "platform": "web"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let token = res.json::<Value>().await?["data"]["access_token"].as_str().context("token")?.to_string();

    let res = client.get(format!("{}/v1/business/list", server.base_url)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.post(format!("{}/v1/auth/logout", server.base_url)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(format!("{}/v1/business/list", server.base_url)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn healthz_answers_without_token() -> Result<()> {
    let Some(db) = common::database().await? else { return Ok(()) };
    let server = spawn_server(db).await?;

    let res = reqwest::get(format!("{}/healthz", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn metrics_are_scrapeable() -> Result<()> {
    let Some(db) = common::database().await? else { return Ok(()) };
    let server = spawn_server(db).await?;

    reqwest::get(format!("{}/healthz", server.base_url)).await?;
    let res = reqwest::get(format!("{}/metrics", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await?;
    assert!(text.contains("yalp_http_requests_total{"), "{}", text);
    Ok(())
}
