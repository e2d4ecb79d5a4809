use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth;
use crate::routes::ApiError;
use crate::state::AppState;

/// Extractor that validates the gateway token via Bearer header or query param.
pub struct Authenticated;

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "));
        let query = parts.uri.query().unwrap_or("");
        let query_token = auth::extract_token_from_query(query);

        let allowed = auth::validate_token(&state.config, bearer, query_token);

        async move {
            if allowed {
                Ok(Authenticated)
            } else {
                Err(ApiError::unauthorized())
            }
        }
    }
}

/// JSON request body whose rejections use the gateway's error body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
