use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::resolve_requester;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Operational routes, no requester needed
    let ops = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::scrape));

    // Application routes. Requester resolved from the identity header;
    // each handler decides whether a login is required
    let app = Router::new()
        .route("/", get(handlers::listings::home))
        // Listings
        .route("/predictions", get(handlers::listings::index).post(handlers::predictions::create))
        .route("/predictions/unjudged", get(handlers::listings::unjudged))
        .route("/predictions/judged", get(handlers::listings::judged))
        .route("/predictions/future", get(handlers::listings::future))
        .route("/predictions/happenstance", get(handlers::listings::happenstance))
        // Single prediction
        .route("/predictions/new", get(handlers::predictions::new_form))
        .route(
            "/predictions/:id",
            get(handlers::predictions::show).put(handlers::predictions::update),
        )
        .route("/predictions/:id/edit", get(handlers::predictions::edit))
        .route("/predictions/:id/responses", post(handlers::predictions::respond))
        .route("/predictions/:id/judge", post(handlers::predictions::judge))
        .route("/predictions/:id/withdraw", post(handlers::predictions::withdraw))
        .route(
            "/predictions/:id/deadline_notification",
            put(handlers::predictions::deadline_notification),
        )
        // Statistics
        .route("/statistics", get(handlers::statistics::global))
        .route("/users/:user_id/statistics", get(handlers::statistics::for_user))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_requester));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    ops.merge(app)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
