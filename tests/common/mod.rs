use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::{Duration, Utc};

use predictions::api::router::create_router;
use predictions::cache::MemoryFragmentCache;
use predictions::config::AppConfig;
use predictions::db::{MemoryStore, PredictionStore};
use predictions::models::{NewPrediction, NewResponse, Prediction, UserRef};
use predictions::AppState;

pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryFragmentCache>,
}

/// Router over an in-memory store with default configuration.
#[allow(dead_code)]
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryFragmentCache::new());

    let state = AppState {
        store: store.clone(),
        cache: cache.clone(),
        config: AppConfig::default(),
        metrics_handle: predictions::metrics::init_metrics(),
    };

    TestApp {
        router: create_router(state),
        store,
        cache,
    }
}

/// Seed a prediction whose deadline is `days` from now (negative for past).
#[allow(dead_code)]
pub async fn seed_prediction(
    store: &MemoryStore,
    creator: &str,
    private: bool,
    days: i64,
) -> Prediction {
    let draft = NewPrediction {
        description: format!("{creator}'s forecast"),
        deadline: Some(Utc::now() + Duration::days(days)),
        private,
        ..Default::default()
    };
    store
        .create_prediction(draft, &UserRef::new(creator))
        .await
        .expect("Failed to seed prediction")
}

/// Seed a wager and return the refreshed prediction.
#[allow(dead_code)]
pub async fn seed_wager(
    store: &MemoryStore,
    prediction: &Prediction,
    user: &str,
    confidence: i32,
) -> Prediction {
    let current = store
        .find_prediction(prediction.id)
        .await
        .unwrap()
        .expect("seeded prediction vanished");
    let wager = NewResponse {
        comment: None,
        confidence: Some(confidence),
    };
    store
        .create_response(&current, wager, &UserRef::new(user))
        .await
        .expect("Failed to seed wager");
    store.find_prediction(prediction.id).await.unwrap().unwrap()
}

#[allow(dead_code)]
pub fn request(method: &str, uri: &str, user: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request with a body sent verbatim under the given content type.
#[allow(dead_code)]
pub fn raw_request(
    method: &str,
    uri: &str,
    user: Option<&str>,
    content_type: &str,
    body: &str,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get("location")
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[allow(dead_code)]
pub fn assert_login_redirect(resp: &Response<Body>) {
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(
        location(resp).starts_with("/users/sign_in?return_to="),
        "unexpected redirect {}",
        location(resp)
    );
}
