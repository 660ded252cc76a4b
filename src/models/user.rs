//! This file defines a user of the application and its supporting types.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    db::{CreateTable, DbError, MapRow},
    models::PasswordHash,
};

/// A newtype wrapper for integer user IDs.
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserID(i64);

impl UserID {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
///
/// Holds the password hash, so this type must never be serialized into a response body.
/// Use [UserResponse] for anything that leaves the server.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserID,
    email: EmailAddress,
    password_hash: PasswordHash,
    first_name: String,
    last_name: String,
}

impl User {
    /// The user's ID in the database.
    pub fn id(&self) -> UserID {
        self.id
    }

    /// The email address associated with the user.
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// The user's password hash.
    pub fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }

    /// Insert a new user into the database.
    ///
    /// # Errors
    ///
    /// This function will return a:
    /// - [DbError::DuplicateEmail] if the given email address is already in use,
    /// - [DbError::SqlError] if there was an unexpected SQL error.
    pub fn insert(data: ValidatedUser, connection: &Connection) -> Result<User, DbError> {
        connection.execute(
            "INSERT INTO user (email, password, first_name, last_name) VALUES (?1, ?2, ?3, ?4)",
            (
                data.email.to_string(),
                data.password_hash.to_string(),
                &data.first_name,
                &data.last_name,
            ),
        )?;

        let id = UserID::new(connection.last_insert_rowid());

        Ok(User {
            id,
            email: data.email,
            password_hash: data.password_hash,
            first_name: data.first_name,
            last_name: data.last_name,
        })
    }

    /// Get the user that has the specified `email` address, or return [DbError::NotFound] if no
    /// such user exists.
    pub fn select_by_email(email: &str, connection: &Connection) -> Result<Self, DbError> {
        connection
            .prepare(
                "SELECT id, email, password, first_name, last_name FROM user WHERE email = :email",
            )?
            .query_row(&[(":email", email)], User::map_row)
            .map_err(|e| e.into())
    }

    /// Get the user that has the specified `id`, or return [DbError::NotFound] if no such user
    /// exists.
    pub fn select_by_id(id: UserID, connection: &Connection) -> Result<Self, DbError> {
        connection
            .prepare(
                "SELECT id, email, password, first_name, last_name FROM user WHERE id = :id",
            )?
            .query_row(&[(":id", &id.as_i64())], User::map_row)
            .map_err(|e| e.into())
    }
}

impl MapRow for User {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let raw_id = row.get(offset)?;
        let raw_email: String = row.get(offset + 1)?;
        let raw_password_hash: String = row.get(offset + 2)?;
        let first_name = row.get(offset + 3)?;
        let last_name = row.get(offset + 4)?;

        Ok(Self {
            id: UserID::new(raw_id),
            email: EmailAddress::new_unchecked(raw_email),
            password_hash: PasswordHash::new_unchecked(&raw_password_hash),
            first_name,
            last_name,
        })
    }
}

impl CreateTable for User {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE user (
                    id INTEGER PRIMARY KEY,
                    email TEXT UNIQUE NOT NULL,
                    password TEXT NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

/// The user fields accepted from a registration request.
///
/// All fields are optional at the parsing stage so that missing fields produce validation
/// messages instead of a deserialization error. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NewUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A [NewUser] that has passed validation and had its password hashed.
#[derive(Debug)]
pub struct ValidatedUser {
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub first_name: String,
    pub last_name: String,
}

/// The minimum length of a password at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

impl NewUser {
    /// Check the entity invariants for a user and hash the password.
    ///
    /// `cost` is the bcrypt cost, see [PasswordHash::from_raw_password].
    ///
    /// # Errors
    ///
    /// Returns one human-readable message per violated rule, in field order.
    pub fn validate(self, cost: u32) -> Result<ValidatedUser, Vec<String>> {
        let mut errors = Vec::new();

        let email = match self.email.as_deref().filter(|email| !email.is_empty()) {
            None => {
                errors.push("Email can't be blank".to_owned());
                None
            }
            Some(raw_email) => match EmailAddress::from_str(raw_email) {
                Ok(email) => Some(email),
                Err(_) => {
                    errors.push("Email is invalid".to_owned());
                    None
                }
            },
        };

        let password = match self.password.filter(|password| !password.is_empty()) {
            None => {
                errors.push("Password can't be blank".to_owned());
                None
            }
            Some(password) if password.len() < MIN_PASSWORD_LENGTH => {
                errors.push(format!(
                    "Password is too short (minimum is {MIN_PASSWORD_LENGTH} characters)"
                ));
                None
            }
            Some(password) => Some(password),
        };

        let first_name = self.first_name.filter(|name| !name.is_empty());
        if first_name.is_none() {
            errors.push("First name can't be blank".to_owned());
        }

        let last_name = self.last_name.filter(|name| !name.is_empty());
        if last_name.is_none() {
            errors.push("Last name can't be blank".to_owned());
        }

        match (email, password, first_name, last_name) {
            (Some(email), Some(password), Some(first_name), Some(last_name))
                if errors.is_empty() =>
            {
                let password_hash = PasswordHash::from_raw_password(&password, cost)
                    .map_err(|e| vec![e.to_string()])?;

                Ok(ValidatedUser {
                    email,
                    password_hash,
                    first_name,
                    last_name,
                })
            }
            _ => Err(errors),
        }
    }
}

/// The view of a [User] that is safe to send to clients: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserID,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}
