use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::models::invoice::{NewInvoiceItem, Pagination};
use crate::models::{Invoice, InvoiceDraft, InvoiceItem, InvoicePage, ListQuery, NewUser, User};
use crate::repository::{InvoiceRepository, RepositoryError, RepositoryResult, UserRepository};

macro_rules! invoice_columns {
    () => {
        "id, user_id, invoice_number, date, from_name, from_email, to_name, to_email, \
         tax_rate, subtotal, tax_amount, total, created_at, updated_at"
    };
}

macro_rules! item_columns {
    () => {
        "id, invoice_id, position, description, quantity, rate, amount"
    };
}

/// Search filter shared by the count and page queries. `$2` is the escaped
/// ILIKE pattern or NULL.
macro_rules! search_filter {
    () => {
        "user_id = $1 AND ($2::text IS NULL \
         OR invoice_number ILIKE $2 OR from_name ILIKE $2 OR to_name ILIKE $2)"
    };
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, full_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, full_name, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::DuplicateEmail
            }
            other => RepositoryError::Database(other),
        })
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, full_name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

/// PostgreSQL-backed invoice store.
///
/// Each mutating method opens its own transaction; returning early with `?`
/// drops the transaction, which rolls it back.
#[derive(Clone)]
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn create(&self, owner: Uuid, draft: InvoiceDraft) -> RepositoryResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        if number_taken(&mut tx, owner, &draft.invoice_number, None).await? {
            return Err(RepositoryError::DuplicateNumber);
        }

        let mut invoice = sqlx::query_as::<_, Invoice>(concat!(
            "INSERT INTO invoices (id, user_id, invoice_number, date, from_name, from_email, \
             to_name, to_email, tax_rate, subtotal, tax_amount, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING ",
            invoice_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.invoice_number)
        .bind(draft.date)
        .bind(&draft.from_name)
        .bind(&draft.from_email)
        .bind(&draft.to_name)
        .bind(&draft.to_email)
        .bind(draft.tax_rate)
        .bind(draft.subtotal)
        .bind(draft.tax_amount)
        .bind(draft.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(number_conflict)?;

        invoice.items = insert_items(&mut tx, invoice.id, &draft.items).await?;

        tx.commit().await?;

        info!(
            user_id = %owner,
            invoice_id = %invoice.id,
            items = invoice.items.len(),
            "Invoice created"
        );

        Ok(invoice)
    }

    async fn list(&self, owner: Uuid, query: &ListQuery) -> RepositoryResult<InvoicePage> {
        let pattern = query.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(concat!(
            "SELECT COUNT(*) FROM invoices WHERE ",
            search_filter!()
        ))
        .bind(owner)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let mut invoices = sqlx::query_as::<_, Invoice>(concat!(
            "SELECT ",
            invoice_columns!(),
            " FROM invoices WHERE ",
            search_filter!(),
            " ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(owner)
        .bind(pattern.as_deref())
        .bind(query.limit)
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();
        let mut items = load_items(&self.pool, &ids).await?;
        for invoice in &mut invoices {
            invoice.items = items.remove(&invoice.id).unwrap_or_default();
        }

        Ok(InvoicePage {
            pagination: Pagination::new(query, total),
            data: invoices,
        })
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> RepositoryResult<Invoice> {
        let mut invoice = sqlx::query_as::<_, Invoice>(concat!(
            "SELECT ",
            invoice_columns!(),
            " FROM invoices WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        invoice.items = load_items(&self.pool, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(invoice)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        draft: InvoiceDraft,
    ) -> RepositoryResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent updates of the same invoice serialize.
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM invoices WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if number_taken(&mut tx, owner, &draft.invoice_number, Some(id)).await? {
            return Err(RepositoryError::DuplicateNumber);
        }

        let mut invoice = sqlx::query_as::<_, Invoice>(concat!(
            "UPDATE invoices SET invoice_number = $3, date = $4, from_name = $5, \
             from_email = $6, to_name = $7, to_email = $8, tax_rate = $9, subtotal = $10, \
             tax_amount = $11, total = $12, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING ",
            invoice_columns!()
        ))
        .bind(id)
        .bind(owner)
        .bind(&draft.invoice_number)
        .bind(draft.date)
        .bind(&draft.from_name)
        .bind(&draft.from_email)
        .bind(&draft.to_name)
        .bind(&draft.to_email)
        .bind(draft.tax_rate)
        .bind(draft.subtotal)
        .bind(draft.tax_amount)
        .bind(draft.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(number_conflict)?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        invoice.items = insert_items(&mut tx, id, &draft.items).await?;

        tx.commit().await?;

        info!(
            user_id = %owner,
            invoice_id = %id,
            items = invoice.items.len(),
            "Invoice updated"
        );

        Ok(invoice)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        info!(user_id = %owner, invoice_id = %id, "Invoice deleted");

        Ok(())
    }
}

/// Checks whether `owner` already has an invoice numbered `number`,
/// optionally ignoring the invoice being updated. Case-sensitive.
async fn number_taken(
    conn: &mut PgConnection,
    owner: Uuid,
    number: &str,
    exclude: Option<Uuid>,
) -> RepositoryResult<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM invoices
            WHERE user_id = $1 AND invoice_number = $2 AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(owner)
    .bind(number)
    .bind(exclude)
    .fetch_one(conn)
    .await?;
    Ok(taken)
}

async fn insert_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[NewInvoiceItem],
) -> RepositoryResult<Vec<InvoiceItem>> {
    let mut stored = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        let row = sqlx::query_as::<_, InvoiceItem>(concat!(
            "INSERT INTO invoice_items (id, invoice_id, position, description, quantity, rate, amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING ",
            item_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(item.amount)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(row);
    }

    Ok(stored)
}

/// Loads the items of several invoices in one query, grouped by invoice.
async fn load_items<'e, E>(
    executor: E,
    invoice_ids: &[Uuid],
) -> RepositoryResult<HashMap<Uuid, Vec<InvoiceItem>>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    if invoice_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, InvoiceItem>(concat!(
        "SELECT ",
        item_columns!(),
        " FROM invoice_items WHERE invoice_id = ANY($1) ORDER BY invoice_id, position"
    ))
    .bind(invoice_ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<InvoiceItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.invoice_id).or_default().push(row);
    }
    Ok(grouped)
}

fn number_conflict(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::DuplicateNumber
        }
        other => RepositoryError::Database(other),
    }
}

/// Wraps a search term for ILIKE, matching `%`, `_` and `\` literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
