//! This file defines a transaction against a bank account and the balance reconciliation that
//! keeps the parent account consistent with its transactions.
//!
//! Every mutation applies its signed effect to the parent account's balance inside a single SQL
//! transaction: the transaction row and the balance update persist together or not at all.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, types::Type};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    db::{CreateTable, DbError, MapRow},
    models::DatabaseID,
};

/// Whether a transaction adds money to or removes money from its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(()),
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Income => "income",
            Self::Expense => "expense",
        };

        write!(f, "{name}")
    }
}

/// A single movement of money recorded against a bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction's ID in the database.
    pub id: DatabaseID,
    /// The ID of the account the transaction was recorded against.
    pub bank_account_id: DatabaseID,
    /// The amount of money that was moved. Always positive, the direction comes from
    /// `transaction_type`.
    pub amount: Decimal,
    /// Whether the money moved into or out of the account.
    pub transaction_type: TransactionType,
    /// A free-form label for grouping transactions, e.g. "food".
    pub category: String,
    /// An optional note about the transaction.
    pub description: Option<String>,
    /// When the transaction happened. This is the business date, not the time the row was
    /// created.
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// The amount by which this transaction moves its account's balance: positive for income,
    /// negative for expenses.
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    /// Insert a new transaction against `bank_account_id` and apply its signed amount to the
    /// account's balance.
    ///
    /// The caller must have already confirmed that the account belongs to the authenticated user.
    pub fn insert(
        data: ValidatedTransaction,
        bank_account_id: DatabaseID,
        connection: &mut Connection,
    ) -> Result<Transaction, DbError> {
        let sql_transaction = connection.transaction()?;

        sql_transaction.execute(
            "INSERT INTO \"transaction\"
                (bank_account_id, amount, transaction_type, category, description, date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                bank_account_id,
                data.amount.to_string(),
                data.transaction_type.to_string(),
                &data.category,
                &data.description,
                data.date,
            ),
        )?;

        let transaction = Transaction {
            id: sql_transaction.last_insert_rowid(),
            bank_account_id,
            amount: data.amount,
            transaction_type: data.transaction_type,
            category: data.category,
            description: data.description,
            date: data.date,
        };

        apply_balance_delta(&sql_transaction, bank_account_id, transaction.signed_amount())?;

        sql_transaction.commit()?;

        Ok(transaction)
    }

    /// Get the transaction with `id` recorded against `bank_account_id`.
    ///
    /// Returns [DbError::NotFound] both when the transaction does not exist and when it belongs
    /// to a different account.
    pub fn select(
        id: DatabaseID,
        bank_account_id: DatabaseID,
        connection: &Connection,
    ) -> Result<Transaction, DbError> {
        connection
            .prepare(
                "SELECT id, bank_account_id, amount, transaction_type, category, description, date
                    FROM \"transaction\"
                    WHERE id = :id AND bank_account_id = :bank_account_id",
            )?
            .query_row(
                &[(":id", &id), (":bank_account_id", &bank_account_id)],
                Transaction::map_row,
            )
            .map_err(|e| e.into())
    }

    /// Get all transactions recorded against `bank_account_id`.
    pub fn select_by_bank_account(
        bank_account_id: DatabaseID,
        connection: &Connection,
    ) -> Result<Vec<Transaction>, DbError> {
        connection
            .prepare(
                "SELECT id, bank_account_id, amount, transaction_type, category, description, date
                    FROM \"transaction\"
                    WHERE bank_account_id = :bank_account_id ORDER BY id",
            )?
            .query_map(
                &[(":bank_account_id", &bank_account_id)],
                Transaction::map_row,
            )?
            .map(|transaction| transaction.map_err(|e| e.into()))
            .collect()
    }

    /// Overwrite the transaction with `id` with `data`, reversing the old signed amount and
    /// applying the new one to the account's balance.
    pub fn update(
        id: DatabaseID,
        bank_account_id: DatabaseID,
        data: ValidatedTransaction,
        connection: &mut Connection,
    ) -> Result<Transaction, DbError> {
        let sql_transaction = connection.transaction()?;

        let old = select_in_transaction(&sql_transaction, id, bank_account_id)?;

        let transaction = Transaction {
            id,
            bank_account_id,
            amount: data.amount,
            transaction_type: data.transaction_type,
            category: data.category,
            description: data.description,
            date: data.date,
        };

        sql_transaction.execute(
            "UPDATE \"transaction\"
                SET amount = ?1, transaction_type = ?2, category = ?3, description = ?4, date = ?5
                WHERE id = ?6",
            (
                transaction.amount.to_string(),
                transaction.transaction_type.to_string(),
                &transaction.category,
                &transaction.description,
                transaction.date,
                id,
            ),
        )?;

        apply_balance_delta(
            &sql_transaction,
            bank_account_id,
            transaction.signed_amount() - old.signed_amount(),
        )?;

        sql_transaction.commit()?;

        Ok(transaction)
    }

    /// Delete the transaction with `id`, reversing its signed amount on the account's balance.
    pub fn delete(
        id: DatabaseID,
        bank_account_id: DatabaseID,
        connection: &mut Connection,
    ) -> Result<(), DbError> {
        let sql_transaction = connection.transaction()?;

        let old = select_in_transaction(&sql_transaction, id, bank_account_id)?;

        sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

        apply_balance_delta(&sql_transaction, bank_account_id, -old.signed_amount())?;

        sql_transaction.commit()?;

        Ok(())
    }
}

/// Shift a bank account's balance by `delta` within an open SQL transaction.
///
/// The read and write happen on the same serialized connection inside the same SQL transaction,
/// so concurrent mutations cannot lose updates.
fn apply_balance_delta(
    sql_transaction: &rusqlite::Transaction,
    bank_account_id: DatabaseID,
    delta: Decimal,
) -> Result<(), DbError> {
    let raw_balance: String = sql_transaction
        .prepare("SELECT balance FROM bank_account WHERE id = :id")?
        .query_row(&[(":id", &bank_account_id)], |row| row.get(0))?;

    let balance = Decimal::from_str(&raw_balance)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    sql_transaction.execute(
        "UPDATE bank_account SET balance = ?1 WHERE id = ?2",
        ((balance + delta).to_string(), bank_account_id),
    )?;

    Ok(())
}

fn select_in_transaction(
    sql_transaction: &rusqlite::Transaction,
    id: DatabaseID,
    bank_account_id: DatabaseID,
) -> Result<Transaction, DbError> {
    sql_transaction
        .prepare(
            "SELECT id, bank_account_id, amount, transaction_type, category, description, date
                FROM \"transaction\"
                WHERE id = :id AND bank_account_id = :bank_account_id",
        )?
        .query_row(
            &[(":id", &id), (":bank_account_id", &bank_account_id)],
            Transaction::map_row,
        )
        .map_err(|e| e.into())
}

impl MapRow for Transaction {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let id = row.get(offset)?;
        let bank_account_id = row.get(offset + 1)?;

        let raw_amount: String = row.get(offset + 2)?;
        let amount = Decimal::from_str(&raw_amount).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(offset + 2, Type::Text, Box::new(e))
        })?;

        let raw_transaction_type: String = row.get(offset + 3)?;
        let transaction_type = TransactionType::from_str(&raw_transaction_type).map_err(|_| {
            rusqlite::Error::InvalidColumnType(offset + 3, raw_transaction_type, Type::Text)
        })?;

        let category = row.get(offset + 4)?;
        let description = row.get(offset + 5)?;
        let date = row.get(offset + 6)?;

        Ok(Self {
            id,
            bank_account_id,
            amount,
            transaction_type,
            category,
            description,
            date,
        })
    }
}

impl CreateTable for Transaction {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE \"transaction\" (
                    id INTEGER PRIMARY KEY,
                    bank_account_id INTEGER NOT NULL
                        REFERENCES bank_account(id) ON DELETE CASCADE,
                    amount TEXT NOT NULL,
                    transaction_type TEXT NOT NULL,
                    category TEXT NOT NULL,
                    description TEXT,
                    date TEXT NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

/// The transaction fields accepted from create and update requests.
///
/// All fields are optional at the parsing stage so that missing fields produce validation
/// messages instead of a deserialization error. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NewTransaction {
    pub amount: Option<Decimal>,
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// A [NewTransaction] that has passed validation.
#[derive(Debug)]
pub struct ValidatedTransaction {
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

impl NewTransaction {
    /// Check the entity invariants for a transaction.
    ///
    /// # Errors
    ///
    /// Returns one human-readable message per violated rule, in field order.
    pub fn validate(self) -> Result<ValidatedTransaction, Vec<String>> {
        let mut errors = Vec::new();

        if self.amount.is_none() {
            errors.push("Amount can't be blank".to_owned());
        }

        let transaction_type = match self
            .transaction_type
            .as_deref()
            .filter(|transaction_type| !transaction_type.is_empty())
        {
            None => {
                errors.push("Transaction type can't be blank".to_owned());
                None
            }
            Some(raw_transaction_type) => match TransactionType::from_str(raw_transaction_type) {
                Ok(transaction_type) => Some(transaction_type),
                Err(()) => {
                    errors.push("Transaction type is not included in the list".to_owned());
                    None
                }
            },
        };

        let category = self.category.filter(|category| !category.is_empty());
        if category.is_none() {
            errors.push("Category can't be blank".to_owned());
        }

        if self.date.is_none() {
            errors.push("Date can't be blank".to_owned());
        }

        match (self.amount, transaction_type, category, self.date) {
            (Some(amount), Some(transaction_type), Some(category), Some(date))
                if errors.is_empty() =>
            {
                Ok(ValidatedTransaction {
                    amount,
                    transaction_type,
                    category,
                    description: self.description,
                    date,
                })
            }
            _ => Err(errors),
        }
    }
}
