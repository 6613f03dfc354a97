use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
};

use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::UserRef;
use crate::AppState;

/// Who is making the request. `None` for anonymous visitors.
#[derive(Debug, Clone, Default)]
pub struct Requester(pub Option<UserRef>);

impl Requester {
    pub fn user(&self) -> Option<&UserRef> {
        self.0.as_ref()
    }

    /// The signed-in user, or a redirect to the login page that remembers
    /// where the visitor was going.
    pub fn require(&self, uri: &Uri, login_path: &str) -> Result<&UserRef, AppError> {
        self.0.as_ref().ok_or_else(|| AppError::Unauthenticated {
            login_url: login_url(login_path, uri),
        })
    }
}

pub fn login_url(login_path: &str, uri: &Uri) -> String {
    let destination = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    format!("{login_path}?return_to={}", urlencoding::encode(destination))
}

/// Requester-resolution middleware.
///
/// Authentication happens upstream; the authenticated user id arrives in
/// the configured identity header. If `PROXY_TOKEN` is set, the header is
/// trusted only when the request also carries
/// `Authorization: Bearer <token>` matching that value. Otherwise the
/// request is treated as anonymous rather than rejected.
pub async fn resolve_requester(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let requester = identify(
        req.headers(),
        &state.config.identity_header,
        state.config.proxy_token.as_deref(),
    );
    req.extensions_mut().insert(requester);
    next.run(req).await
}

fn identify(headers: &HeaderMap, identity_header: &str, proxy_token: Option<&str>) -> Requester {
    if let Some(expected) = proxy_token {
        let auth_header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        match auth_header {
            Some(value) if bearer_matches(value, expected) => {}
            _ => {
                if headers.contains_key(identity_header) {
                    tracing::warn!("Identity header without valid proxy token; treating as anonymous");
                }
                return Requester(None);
            }
        }
    }

    let user = headers
        .get(identity_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(UserRef::new);

    Requester(user)
}

/// Constant-time check of an `Authorization` value against the proxy token.
fn bearer_matches(header_value: &str, expected: &str) -> bool {
    match header_value.strip_prefix("Bearer ") {
        Some(token) => bool::from(token.as_bytes().ct_eq(expected.as_bytes())),
        None => false,
    }
}
