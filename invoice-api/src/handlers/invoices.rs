use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::models::invoice::ListInvoicesParams;
use crate::models::user::MessageResponse;
use crate::models::{Invoice, InvoicePage, InvoiceRequest, ListQuery};
use crate::validation::validate_invoice;
use crate::AppState;

fn parse_invoice_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid invoice ID".to_string()))
}

/// `POST /api/invoices`
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let draft = validate_invoice(req)?;
    let invoice = state.invoices.create(user_id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": StatusCode::CREATED.as_u16(),
            "data": invoice,
        })),
    ))
}

/// `GET /api/invoices?page=&limit=&search=`
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<InvoicePage>, AppError> {
    let query = ListQuery::from(params);
    let page = state.invoices.list(user_id, &query).await?;

    info!(
        user_id = %user_id,
        page = query.page,
        returned = page.data.len(),
        total = page.pagination.total,
        "Listed invoices"
    );

    Ok(Json(page))
}

/// `GET /api/invoices/:id`
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, AppError> {
    let id = parse_invoice_id(&id)?;
    let invoice = state.invoices.get(user_id, id).await?;
    Ok(Json(invoice))
}

/// `PUT /api/invoices/:id`
///
/// Same validation as create; the stored item set is replaced wholesale.
pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<InvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let id = parse_invoice_id(&id)?;
    let draft = validate_invoice(req)?;
    let invoice = state.invoices.update(user_id, id, draft).await?;
    Ok(Json(invoice))
}

/// `DELETE /api/invoices/:id`
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_invoice_id(&id)?;
    state.invoices.delete(user_id, id).await?;
    Ok(Json(MessageResponse::new("Invoice deleted successfully")))
}
