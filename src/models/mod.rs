//! The application's data model: users, bank accounts and transactions.

mod bank_account;
mod password;
mod transaction;
mod user;

pub use bank_account::{AccountType, BankAccount, NewBankAccount, ValidatedBankAccount};
pub use password::PasswordHash;
pub use transaction::{NewTransaction, Transaction, TransactionType, ValidatedTransaction};
pub use user::{MIN_PASSWORD_LENGTH, NewUser, User, UserID, UserResponse, ValidatedUser};

/// An alias for the integer ID type used by the database.
pub type DatabaseID = i64;
