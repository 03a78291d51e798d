use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub mod token;

pub use token::{Claims, TokenService};

/// Container for the authenticated user's id stored in request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Access gate for protected routes.
///
/// Validates the bearer token and stores [`CurrentUser`] in the request
/// extensions. Requests without a valid token never reach the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = {
        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .ok_or(AppError::MissingToken)?
            .to_str()
            .map_err(|_| AppError::InvalidToken)?;

        let token = bearer_token(header_value).ok_or(AppError::InvalidToken)?;
        state.tokens.validate(token)?
    };

    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}
