//! Multi-tenant invoicing REST service.
//!
//! Users register, log in for a bearer token, and manage invoices scoped to
//! their own account.

use std::sync::Arc;

use sqlx::PgPool;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod repository;
pub mod routes;
pub mod validation;

use auth::TokenService;
use identity::IdentityService;
use repository::InvoiceRepository;

/// Application state containing shared resources.
///
/// Everything is cheap to clone; handlers receive a copy per request.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool, used for health checks
    pub db: PgPool,

    pub identity: IdentityService,

    pub invoices: Arc<dyn InvoiceRepository>,

    pub tokens: Arc<TokenService>,
}
