mod reminder;
mod transaction;

pub use reminder::Reminder;
pub use transaction::{Transaction, TransactionKind, TransactionType};
