//! This file defines a user's bank account, its validation rules and its scoped CRUD operations.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row, types::Type};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    db::{CreateTable, DbError, MapRow},
    models::{DatabaseID, UserID},
};

/// The kinds of bank account the application supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Investment,
}

impl FromStr for AccountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "investment" => Ok(Self::Investment),
            _ => Err(()),
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Investment => "investment",
        };

        write!(f, "{name}")
    }
}

/// A bank account owned by a single user.
///
/// The balance is an arbitrary precision decimal so that applying many transactions cannot
/// accumulate floating point error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    /// The account's ID in the database.
    pub id: DatabaseID,
    /// The ID of the user that owns this account.
    pub user_id: UserID,
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The amount of money currently in the account.
    pub balance: Decimal,
    /// The currency the balance is denominated in.
    pub currency: String,
}

impl BankAccount {
    /// Insert a new bank account owned by `user_id` into the database.
    pub fn insert(
        data: ValidatedBankAccount,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<BankAccount, DbError> {
        connection.execute(
            "INSERT INTO bank_account (user_id, name, account_type, balance, currency)
                VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                user_id.as_i64(),
                &data.name,
                data.account_type.to_string(),
                data.balance.to_string(),
                &data.currency,
            ),
        )?;

        let id = connection.last_insert_rowid();

        Ok(BankAccount {
            id,
            user_id,
            name: data.name,
            account_type: data.account_type,
            balance: data.balance,
            currency: data.currency,
        })
    }

    /// Get the bank account with `id` owned by `user_id`.
    ///
    /// Returns [DbError::NotFound] both when the account does not exist and when it belongs to a
    /// different user, so that one user cannot probe for another user's account IDs.
    pub fn select(
        id: DatabaseID,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<BankAccount, DbError> {
        connection
            .prepare(
                "SELECT id, user_id, name, account_type, balance, currency FROM bank_account
                    WHERE id = :id AND user_id = :user_id",
            )?
            .query_row(
                &[(":id", &id), (":user_id", &user_id.as_i64())],
                BankAccount::map_row,
            )
            .map_err(|e| e.into())
    }

    /// Get all bank accounts owned by `user_id`.
    pub fn select_by_user(
        user_id: UserID,
        connection: &Connection,
    ) -> Result<Vec<BankAccount>, DbError> {
        connection
            .prepare(
                "SELECT id, user_id, name, account_type, balance, currency FROM bank_account
                    WHERE user_id = :user_id ORDER BY id",
            )?
            .query_map(&[(":user_id", &user_id.as_i64())], BankAccount::map_row)?
            .map(|account| account.map_err(|e| e.into()))
            .collect()
    }

    /// Overwrite the account with `id` owned by `user_id` with `data`.
    ///
    /// Returns [DbError::NotFound] if the account does not exist within the user's accounts.
    pub fn update(
        id: DatabaseID,
        user_id: UserID,
        data: ValidatedBankAccount,
        connection: &Connection,
    ) -> Result<BankAccount, DbError> {
        let rows_affected = connection.execute(
            "UPDATE bank_account SET name = ?1, account_type = ?2, balance = ?3, currency = ?4
                WHERE id = ?5 AND user_id = ?6",
            (
                &data.name,
                data.account_type.to_string(),
                data.balance.to_string(),
                &data.currency,
                id,
                user_id.as_i64(),
            ),
        )?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(BankAccount {
            id,
            user_id,
            name: data.name,
            account_type: data.account_type,
            balance: data.balance,
            currency: data.currency,
        })
    }

    /// Delete the account with `id` owned by `user_id` along with all of its transactions.
    ///
    /// The account and its transactions are deleted in a single SQL transaction: either all rows
    /// are removed or none are.
    pub fn delete(
        id: DatabaseID,
        user_id: UserID,
        connection: &mut Connection,
    ) -> Result<(), DbError> {
        let sql_transaction = connection.transaction()?;

        // Confirm ownership before touching the nested rows.
        sql_transaction
            .prepare("SELECT id FROM bank_account WHERE id = :id AND user_id = :user_id")?
            .query_row(&[(":id", &id), (":user_id", &user_id.as_i64())], |row| {
                row.get::<_, DatabaseID>(0)
            })?;

        sql_transaction.execute(
            "DELETE FROM \"transaction\" WHERE bank_account_id = ?1",
            (id,),
        )?;
        sql_transaction.execute("DELETE FROM bank_account WHERE id = ?1", (id,))?;

        sql_transaction.commit()?;

        Ok(())
    }
}

impl MapRow for BankAccount {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let id = row.get(offset)?;
        let user_id = UserID::new(row.get(offset + 1)?);
        let name = row.get(offset + 2)?;

        let raw_account_type: String = row.get(offset + 3)?;
        let account_type = AccountType::from_str(&raw_account_type).map_err(|_| {
            rusqlite::Error::InvalidColumnType(offset + 3, raw_account_type, Type::Text)
        })?;

        let raw_balance: String = row.get(offset + 4)?;
        let balance = Decimal::from_str(&raw_balance).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(offset + 4, Type::Text, Box::new(e))
        })?;

        let currency = row.get(offset + 5)?;

        Ok(Self {
            id,
            user_id,
            name,
            account_type,
            balance,
            currency,
        })
    }
}

impl CreateTable for BankAccount {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE bank_account (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    account_type TEXT NOT NULL,
                    balance TEXT NOT NULL,
                    currency TEXT NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

/// The bank account fields accepted from create and update requests.
///
/// All fields are optional at the parsing stage so that missing fields produce validation
/// messages instead of a deserialization error. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NewBankAccount {
    pub name: Option<String>,
    pub account_type: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
}

/// A [NewBankAccount] that has passed validation.
#[derive(Debug)]
pub struct ValidatedBankAccount {
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub currency: String,
}

impl NewBankAccount {
    /// Check the entity invariants for a bank account.
    ///
    /// # Errors
    ///
    /// Returns one human-readable message per violated rule, in field order.
    pub fn validate(self) -> Result<ValidatedBankAccount, Vec<String>> {
        let mut errors = Vec::new();

        let name = self.name.filter(|name| !name.is_empty());
        if name.is_none() {
            errors.push("Name can't be blank".to_owned());
        }

        let account_type = match self
            .account_type
            .as_deref()
            .filter(|account_type| !account_type.is_empty())
        {
            None => {
                errors.push("Account type can't be blank".to_owned());
                None
            }
            Some(raw_account_type) => match AccountType::from_str(raw_account_type) {
                Ok(account_type) => Some(account_type),
                Err(()) => {
                    errors.push("Account type is not included in the list".to_owned());
                    None
                }
            },
        };

        if self.balance.is_none() {
            errors.push("Balance can't be blank".to_owned());
        }

        let currency = self.currency.filter(|currency| !currency.is_empty());
        if currency.is_none() {
            errors.push("Currency can't be blank".to_owned());
        }

        match (name, account_type, self.balance, currency) {
            (Some(name), Some(account_type), Some(balance), Some(currency))
                if errors.is_empty() =>
            {
                Ok(ValidatedBankAccount {
                    name,
                    account_type,
                    balance,
                    currency,
                })
            }
            _ => Err(errors),
        }
    }
}
