use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, OptionalFromRequest, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
    Json,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::de::DeserializeOwned;

use shared_database::AppState;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Verifies the bearer token and stores the caller's `AuthUser` in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Missing or malformed bearer token".to_string()))?;

    let user = validate_token(bearer.token(), &state.config.jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn require_role(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' is not permitted to perform this action",
            user.role
        )))
    }
}

/// `Json` whose rejections render as validation errors in the API error format.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match <Json<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

/// Optional body: a request without a `Content-Type` header yields `None`.
impl<T, S> OptionalFromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return Ok(None);
        }

        <AppJson<T> as FromRequest<S>>::from_request(req, state).await.map(Some)
    }
}

/// `Query` counterpart of [`AppJson`].
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::test_utils::TestUser;

    #[test]
    fn require_role_rejects_other_roles() {
        let patient = TestUser::patient("p@example.com").to_auth_user();
        let admin = TestUser::admin("a@example.com").to_auth_user();

        assert!(require_role(&admin, &[Role::Admin]).is_ok());
        assert_matches!(require_role(&patient, &[Role::Admin, Role::Doctor]), Err(AppError::Forbidden(_)));
    }
}
