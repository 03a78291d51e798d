pub mod auth;
pub mod health;
pub mod invoices;

pub use auth::{login, register};
pub use health::{db_health_check, health_check, root};
pub use invoices::{create_invoice, delete_invoice, get_invoice, list_invoices, update_invoice};
