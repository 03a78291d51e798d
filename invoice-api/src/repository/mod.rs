//! Storage interfaces.
//!
//! Handlers only see these traits. The PostgreSQL implementations in
//! [`postgres`] run every mutating operation inside one explicit transaction.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceDraft, InvoicePage, ListQuery, NewUser, User};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::{PgInvoiceRepository, PgUserRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Missing, or owned by somebody else
    #[error("record not found")]
    NotFound,

    #[error("invoice number already exists")]
    DuplicateNumber,

    #[error("email already exists")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`RepositoryError::DuplicateEmail`] if the email is taken.
    async fn insert(&self, user: NewUser) -> RepositoryResult<User>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
}

/// Invoices scoped to their owner. Every method takes the owner id and never
/// reveals invoices belonging to anybody else.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persists the invoice and its items as one unit.
    ///
    /// Fails with [`RepositoryError::DuplicateNumber`] if the owner already
    /// has an invoice with the same number.
    async fn create(&self, owner: Uuid, draft: InvoiceDraft) -> RepositoryResult<Invoice>;

    async fn list(&self, owner: Uuid, query: &ListQuery) -> RepositoryResult<InvoicePage>;

    async fn get(&self, owner: Uuid, id: Uuid) -> RepositoryResult<Invoice>;

    /// Replaces the scalar fields and the whole item set atomically.
    async fn update(&self, owner: Uuid, id: Uuid, draft: InvoiceDraft)
        -> RepositoryResult<Invoice>;

    /// Deletes the invoice and, by cascade, its items.
    async fn delete(&self, owner: Uuid, id: Uuid) -> RepositoryResult<()>;
}
