/*! This module defines and implements traits for interacting with the application's database. */

use rusqlite::{Connection, Error, Row};

use crate::models::{BankAccount, Transaction, User};

/// Errors originating from operations on the app's database.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DbError {
    /// The user's email already exists in the database. The client should try again with a
    /// different email address.
    #[error("the email is already in use")]
    DuplicateEmail,

    /// A query was given an invalid foreign key. The client should check that the ids are valid.
    #[error("an invalid foreign key was given")]
    InvalidForeignKey,

    /// The row could not be found with the provided info (e.g., id). The client should try again
    /// with different parameters.
    #[error("the requested row could not be found")]
    NotFound,

    /// Wrapper for Sqlite errors not handled by the other enum entries.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(Error),
}

impl From<Error> for DbError {
    fn from(error: Error) -> Self {
        match error {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            Error::SqliteFailure(sql_error, Some(_)) if sql_error.extended_code == 787 => {
                DbError::InvalidForeignKey
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("email") =>
            {
                DbError::DuplicateEmail
            }
            Error::QueryReturnedNoRows => DbError::NotFound,
            e => DbError::SqlError(e),
        }
    }
}

/// A trait for adding an object schema to a database.
pub trait CreateTable {
    /// Create a table for the model.
    ///
    /// # Errors
    /// Returns an error if the table already exists or if there is an SQL error.
    fn create_table(connection: &Connection) -> Result<(), Error>;
}

/// A trait for mapping a `rusqlite::Row` from a SQLite database to a concrete rust type.
pub trait MapRow {
    type ReturnType;

    /// Convert a row into a concrete type, starting from the first column.
    ///
    /// # Errors
    /// Returns an error if a column value could not be converted into the corresponding field's
    /// type.
    fn map_row(row: &Row) -> Result<Self::ReturnType, Error> {
        Self::map_row_with_offset(row, 0)
    }

    /// Convert a row into a concrete type, starting from the column at `offset`.
    ///
    /// # Errors
    /// Returns an error if a column value could not be converted into the corresponding field's
    /// type.
    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, Error>;
}

/// Create the tables for all models and enable foreign key enforcement.
///
/// # Errors
/// Returns an error if the tables already exist or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    User::create_table(connection)?;
    BankAccount::create_table(connection)?;
    Transaction::create_table(connection)?;

    Ok(())
}
