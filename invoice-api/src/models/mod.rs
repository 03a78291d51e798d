pub mod invoice;
pub mod user;

pub use invoice::{Invoice, InvoiceDraft, InvoiceItem, InvoicePage, InvoiceRequest, ListQuery};
pub use user::{NewUser, User};
