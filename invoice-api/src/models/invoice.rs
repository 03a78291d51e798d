use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Default page size for `GET /api/invoices`.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound for the page size; larger requests are clamped.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Largest page number whose offset still fits in an `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Invoice model representing an invoice in the system.
///
/// This struct maps to the `invoices` table. `items` is not a column: it is
/// filled from `invoice_items` after the row is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: Uuid,

    /// ID of the user who owns this invoice
    #[serde(rename = "userID")]
    pub user_id: Uuid,

    /// Invoice number (unique per user)
    pub invoice_number: String,

    /// Date the invoice was issued
    pub date: NaiveDate,

    pub from_name: String,
    pub from_email: String,
    pub to_name: String,
    pub to_email: String,

    /// Tax rate in percent, 0 to 100
    pub tax_rate: Decimal,

    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,

    /// Line items, ordered by position
    #[sqlx(skip)]
    pub items: Vec<InvoiceItem>,

    /// Timestamp when the invoice was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the invoice was last updated
    pub updated_at: DateTime<Utc>,
}

/// A single line on an invoice. Owned exclusively by one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,

    #[serde(skip)]
    pub invoice_id: Uuid,

    /// Zero-based order of the item within its invoice
    #[serde(skip)]
    pub position: i32,

    pub description: String,
    pub quantity: i32,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Body of `POST /api/invoices` and `PUT /api/invoices/:id`.
///
/// Only shape checks live here; date parsing and the amount checks happen in
/// [`crate::validation::validate_invoice`].
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    #[serde(alias = "number")]
    #[validate(length(min = 1, max = 50, message = "invoice number must be 1 to 50 characters"))]
    pub invoice_number: String,

    /// Issue date as `YYYY-MM-DD`
    pub date: String,

    #[validate(length(min = 1, message = "sender name is required"))]
    pub from_name: String,

    #[validate(email(message = "invalid sender email"))]
    pub from_email: String,

    #[validate(length(min = 1, message = "recipient name is required"))]
    pub to_name: String,

    #[validate(email(message = "invalid recipient email"))]
    pub to_email: String,

    #[serde(default)]
    pub tax_rate: Decimal,

    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,

    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, message = "item description is required"))]
    pub description: String,

    #[validate(range(min = 1, message = "item quantity must be at least 1"))]
    pub quantity: i32,

    pub rate: Decimal,
    pub amount: Decimal,
}

/// A validated invoice, ready to be written by a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub invoice_number: String,
    pub date: NaiveDate,
    pub from_name: String,
    pub from_email: String,
    pub to_name: String,
    pub to_email: String,
    pub tax_rate: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Raw query string of `GET /api/invoices`.
///
/// Kept as strings so that garbage values fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInvoicesParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

/// Normalized listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number
    pub page: i64,
    /// Page size in `1..=MAX_PAGE_SIZE`
    pub limit: i64,
    /// Case-insensitive substring filter, `None` when blank
    pub search: Option<String>,
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
        }
    }
}

impl From<ListInvoicesParams> for ListQuery {
    fn from(params: ListInvoicesParams) -> Self {
        let page = params
            .page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_PAGE);
        let limit = params
            .limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let search = params
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            page,
            limit,
            search,
        }
    }
}

/// One page of invoices plus the pagination summary.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePage {
    pub data: Vec<Invoice>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    /// Number of matching invoices before pagination
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: i64) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
            total,
            total_pages: (total + query.limit - 1) / query.limit,
        }
    }
}
