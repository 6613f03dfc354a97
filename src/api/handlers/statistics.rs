use axum::extract::{Path, State};
use axum::Json;

use crate::cache::{user_statistics_key, GLOBAL_STATISTICS_KEY};
use crate::errors::AppError;
use crate::models::UserId;
use crate::statistics::Statistics;
use crate::AppState;

use super::ApiResponse;

/// Statistics for one user, or site-wide, served from the fragment cache
/// when a rendered copy exists.
pub(crate) async fn cached_statistics(
    state: &AppState,
    user: Option<&UserId>,
) -> Result<Statistics, AppError> {
    let key = match user {
        Some(u) => user_statistics_key(u),
        None => GLOBAL_STATISTICS_KEY.to_string(),
    };

    // Noted before reading anything, so a judgment landing mid-render
    // keeps the stale fragment out of the cache.
    let generation = state.cache.generation(&key);

    if let Some(fragment) = state.cache.read(&key) {
        match serde_json::from_str(&fragment) {
            Ok(stats) => return Ok(stats),
            Err(e) => tracing::warn!(key = %key, error = %e, "Discarding unreadable fragment"),
        }
    }

    let wagers = state.store.scored_wagers(user).await?;
    let stats = Statistics::from_wagers(&wagers);

    // Any path segment names a user, so only users with scored wagers get
    // a fragment.
    if user.is_none() || !wagers.is_empty() {
        let fragment = serde_json::to_string(&stats).map_err(anyhow::Error::from)?;
        let stored = state.cache.write(&key, fragment, generation);
        tracing::debug!(key = %key, wagers = wagers.len(), stored, "Rendered statistics fragment");
    }

    Ok(stats)
}

/// GET /statistics: site-wide calibration
pub async fn global(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Statistics>>, AppError> {
    let stats = cached_statistics(&state, None).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /users/{user_id}/statistics: one user's calibration
pub async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Statistics>>, AppError> {
    let stats = cached_statistics(&state, Some(&UserId::new(user_id))).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
