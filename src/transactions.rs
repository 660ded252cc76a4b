//! Route handlers for the transaction resource, nested under a bank account.
//!
//! Every handler first resolves the parent account within the authenticated user's accounts, so
//! a transaction can never be read or mutated through an account the caller does not own. The
//! balance reconciliation itself lives in [crate::models::Transaction].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    auth::AuthenticatedUser,
    config::AppConfig,
    db::DbError,
    error::AppError,
    models::{BankAccount, DatabaseID, NewTransaction, Transaction, UserID},
};

fn account_not_found(error: DbError) -> AppError {
    match error {
        DbError::NotFound => AppError::BankAccountNotFound,
        e => AppError::Database(e),
    }
}

fn transaction_not_found(error: DbError) -> AppError {
    match error {
        DbError::NotFound => AppError::TransactionNotFound,
        e => AppError::Database(e),
    }
}

/// Confirm that `bank_account_id` belongs to `user_id` before any transaction rows are touched.
fn resolve_account(
    bank_account_id: DatabaseID,
    user_id: UserID,
    connection: &rusqlite::Connection,
) -> Result<BankAccount, AppError> {
    BankAccount::select(bank_account_id, user_id, connection).map_err(account_not_found)
}

/// A route handler for listing the transactions recorded against one of the authenticated user's
/// bank accounts.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn list_transactions(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(bank_account_id): Path<DatabaseID>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let connection = state.db_connection().lock().unwrap();

    let account = resolve_account(bank_account_id, user.id(), &connection)?;
    let transactions = Transaction::select_by_bank_account(account.id, &connection)?;

    Ok(Json(transactions))
}

/// A route handler for recording a new transaction against one of the authenticated user's bank
/// accounts. The transaction row and the balance adjustment persist atomically.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_transaction(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(bank_account_id): Path<DatabaseID>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<impl IntoResponse, AppError> {
    let mut connection = state.db_connection().lock().unwrap();

    let account = resolve_account(bank_account_id, user.id(), &connection)?;
    let data = new_transaction.validate().map_err(AppError::Validation)?;

    let transaction = Transaction::insert(data, account.id, &mut connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for getting a single transaction by ID.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_transaction(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((bank_account_id, id)): Path<(DatabaseID, DatabaseID)>,
) -> Result<Json<Transaction>, AppError> {
    let connection = state.db_connection().lock().unwrap();

    let account = resolve_account(bank_account_id, user.id(), &connection)?;
    let transaction =
        Transaction::select(id, account.id, &connection).map_err(transaction_not_found)?;

    Ok(Json(transaction))
}

/// A route handler for overwriting a transaction. The old signed amount is reversed and the new
/// one applied to the account balance in the same atomic unit as the row update.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_transaction(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((bank_account_id, id)): Path<(DatabaseID, DatabaseID)>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<Json<Transaction>, AppError> {
    let mut connection = state.db_connection().lock().unwrap();

    let account = resolve_account(bank_account_id, user.id(), &connection)?;
    let data = new_transaction.validate().map_err(AppError::Validation)?;

    let transaction =
        Transaction::update(id, account.id, data, &mut connection).map_err(transaction_not_found)?;

    Ok(Json(transaction))
}

/// A route handler for deleting a transaction, reversing its effect on the account balance.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn delete_transaction(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((bank_account_id, id)): Path<(DatabaseID, DatabaseID)>,
) -> Result<StatusCode, AppError> {
    let mut connection = state.db_connection().lock().unwrap();

    let account = resolve_account(bank_account_id, user.id(), &connection)?;
    Transaction::delete(id, account.id, &mut connection).map_err(transaction_not_found)?;

    Ok(StatusCode::NO_CONTENT)
}
