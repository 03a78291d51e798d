use axum::{extract::State, http::StatusCode, response::Json};

use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::models::user::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use crate::AppState;

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state
        .identity
        .register(req.full_name, req.email, req.password)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("user created"))))
}

/// `POST /api/login`
///
/// Unknown email and wrong password both produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user_id = state.identity.authenticate(&req.email, req.password).await?;
    let token = state.tokens.issue(user_id)?;

    Ok(Json(LoginResponse {
        message: "login success".to_string(),
        token,
    }))
}
