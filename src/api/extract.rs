use axum::{
    async_trait,
    body::{to_bytes, Body},
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// A submitted form, posted either as JSON or as
/// `application/x-www-form-urlencoded` parameters.
///
/// Only a body with nothing in it yields `T::default()`. A body that can't
/// be read as `T` is a 400. Handlers take `Result<Submitted<T>, AppError>`
/// so they can ask for a login before complaining about the body.
#[derive(Debug, Clone, Default)]
pub struct Submitted<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Submitted<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| AppError::BadRequest(format!("unreadable request body: {e}")))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        if is_form(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Choice {
        outcome: String,
        score: Option<i32>,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<Choice, AppError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        Submitted::<Choice>::from_request(req, &()).await.map(|Submitted(c)| c)
    }

    #[tokio::test]
    async fn test_empty_body_is_default() {
        assert_eq!(extract(None, "").await.unwrap(), Choice::default());
        assert_eq!(extract(Some("application/json"), "  \n").await.unwrap(), Choice::default());
    }

    #[tokio::test]
    async fn test_json_and_form_bodies() {
        let json = extract(Some("application/json"), r#"{"outcome":"right","score":3}"#)
            .await
            .unwrap();
        assert_eq!(json.outcome, "right");
        assert_eq!(json.score, Some(3));

        let form = extract(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "outcome=wrong&score=4",
        )
        .await
        .unwrap();
        assert_eq!(form.outcome, "wrong");
        assert_eq!(form.score, Some(4));
    }

    #[tokio::test]
    async fn test_unreadable_bodies_rejected() {
        let cases = [
            (Some("application/json"), r#"{"outcome": "wrong""#),
            (Some("application/json"), r#"{"outcome": 42}"#),
            (None, r#"{"outcome":"right"}"#),
            (Some("text/plain"), "right"),
            (Some("application/x-www-form-urlencoded"), "score=lots"),
        ];

        for (content_type, body) in cases {
            let result = extract(content_type, body).await;
            assert!(
                matches!(result, Err(AppError::BadRequest(_))),
                "{content_type:?} {body:?} gave {result:?}"
            );
        }
    }
}
