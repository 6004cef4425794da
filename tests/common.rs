#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, Response, StatusCode};
use axum::Router;
use goal_tracker_oauth::{
    app::{build_router, AppState},
    clock::{Clock, ManualClock},
    config::AppConfig,
    db,
    models::user::{NewUser, User},
    repos::{sqlite::SqliteOAuthRepo, OAuthRepo},
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub _dir: TempDir,
    pub repo: Arc<dyn OAuthRepo>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    pub router: Router,
}

pub fn init_test_app() -> anyhow::Result<TestApp> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("test.sqlite").display().to_string();

    let pool = db::sqlite::make_pool_with_size(&db_path, 4)?;
    {
        let mut conn = pool.get()?;
        db::migrations::run_sqlite_migrations(&mut conn)?;
    }

    let repo: Arc<dyn OAuthRepo> = SqliteOAuthRepo::new(pool);
    let clock = Arc::new(ManualClock::starting_now());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let state = AppState::new(AppConfig::for_database(db_path, JWT_SECRET), repo.clone(), dyn_clock);
    let router = build_router(state.clone());

    Ok(TestApp { _dir: dir, repo, clock, state, router })
}

pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let res = send(router, req).await;
    let status = res.status();
    (status, body_json(res).await)
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a client over HTTP; returns `(client_id, client_secret)`.
pub async fn register_client(app: &TestApp, redirect_uris: &[&str]) -> (String, String) {
    let (status, body) = post_json(
        &app.router,
        "/oauth/clients",
        json!({ "redirectUris": redirect_uris, "grants": ["authorization_code", "refresh_token"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["clientId"].as_str().unwrap().to_string(),
        body["clientSecret"].as_str().unwrap().to_string(),
    )
}

/// Create a user and make it the owner of `client_id`, as the installation
/// step does.
pub async fn link_owner(app: &TestApp, client_id: &str, email: &str) -> User {
    let id = uuid::Uuid::new_v4().to_string();
    let user = app
        .repo
        .create_user(NewUser {
            id: &id,
            name: Some("Goal Setter"),
            email,
            avatar_url: None,
            created_at: app.clock.unix_now(),
        })
        .await
        .unwrap();
    app.repo
        .link_client_user(client_id, &user.id, app.clock.unix_now())
        .await
        .unwrap();
    user
}

/// Run `/oauth/authorize` and return the issued code.
pub async fn authorize_code(app: &TestApp, client_id: &str, redirect_uri: &str) -> String {
    let uri = format!(
        "/oauth/authorize?client_id={}&redirect_uri={}&response_type=code&state=s1",
        encode(client_id),
        encode(redirect_uri)
    );
    let res = get(&app.router, &uri).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let location = res.headers().get("location").unwrap().to_str().unwrap().to_string();
    query_param(&location, "code").expect("code in redirect")
}

pub fn query_param(location: &str, name: &str) -> Option<String> {
    let (_, query) = location.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub async fn exchange_code(
    app: &TestApp,
    code: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
) -> (StatusCode, Value) {
    post_json(
        &app.router,
        "/oauth/token",
        json!({
            "grant_type": "authorization_code",
            "code": code,
            "client_id": client_id,
            "client_secret": client_secret,
            "redirect_uri": redirect_uri,
        }),
    )
    .await
}
