//! In-memory repositories for router tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::invoice::Pagination;
use crate::models::{Invoice, InvoiceDraft, InvoiceItem, InvoicePage, ListQuery, NewUser, User};
use crate::repository::{InvoiceRepository, RepositoryError, RepositoryResult, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: NewUser) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        let stored = User {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

/// Invoices kept with an insertion sequence so listing order is stable even
/// when two invoices share a timestamp.
#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    invoices: RwLock<Vec<(u64, Invoice)>>,
    seq: AtomicU64,
}

impl InMemoryInvoiceRepository {
    fn build(id: Uuid, owner: Uuid, draft: InvoiceDraft, created_at: chrono::DateTime<Utc>) -> Invoice {
        let items = draft
            .items
            .into_iter()
            .enumerate()
            .map(|(position, item)| InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id: id,
                position: position as i32,
                description: item.description,
                quantity: item.quantity,
                rate: item.rate,
                amount: item.amount,
            })
            .collect();

        Invoice {
            id,
            user_id: owner,
            invoice_number: draft.invoice_number,
            date: draft.date,
            from_name: draft.from_name,
            from_email: draft.from_email,
            to_name: draft.to_name,
            to_email: draft.to_email,
            tax_rate: draft.tax_rate,
            subtotal: draft.subtotal,
            tax_amount: draft.tax_amount,
            total: draft.total,
            items,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn create(&self, owner: Uuid, draft: InvoiceDraft) -> RepositoryResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        if invoices
            .iter()
            .any(|(_, i)| i.user_id == owner && i.invoice_number == draft.invoice_number)
        {
            return Err(RepositoryError::DuplicateNumber);
        }

        let invoice = Self::build(Uuid::new_v4(), owner, draft, Utc::now());
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        invoices.push((seq, invoice.clone()));
        Ok(invoice)
    }

    async fn list(&self, owner: Uuid, query: &ListQuery) -> RepositoryResult<InvoicePage> {
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let invoices = self.invoices.read().await;

        let mut matching: Vec<&(u64, Invoice)> = invoices
            .iter()
            .filter(|(_, i)| i.user_id == owner)
            .filter(|(_, i)| match &needle {
                Some(n) => [&i.invoice_number, &i.from_name, &i.to_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(n.as_str())),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|(_, i)| i.clone())
            .collect();

        Ok(InvoicePage {
            data,
            pagination: Pagination::new(query, total),
        })
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> RepositoryResult<Invoice> {
        self.invoices
            .read()
            .await
            .iter()
            .find(|(_, i)| i.id == id && i.user_id == owner)
            .map(|(_, i)| i.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        draft: InvoiceDraft,
    ) -> RepositoryResult<Invoice> {
        let mut invoices = self.invoices.write().await;

        let index = invoices
            .iter()
            .position(|(_, i)| i.id == id && i.user_id == owner)
            .ok_or(RepositoryError::NotFound)?;

        if invoices.iter().any(|(_, i)| {
            i.user_id == owner && i.id != id && i.invoice_number == draft.invoice_number
        }) {
            return Err(RepositoryError::DuplicateNumber);
        }

        let created_at = invoices[index].1.created_at;
        let updated = Self::build(id, owner, draft, created_at);
        invoices[index].1 = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> RepositoryResult<()> {
        let mut invoices = self.invoices.write().await;
        let before = invoices.len();
        invoices.retain(|(_, i)| !(i.id == id && i.user_id == owner));
        if invoices.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
