//! Route handlers for the bank account resource.
//!
//! Every handler requires a bearer token and only ever touches accounts owned by the resolved
//! user. An account that exists but belongs to someone else is reported as not found.

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
    models::{BankAccount, DatabaseID, NewBankAccount},
};

fn account_not_found(error: DbError) -> AppError {
    match error {
        DbError::NotFound => AppError::BankAccountNotFound,
        e => AppError::Database(e),
    }
}

/// A route handler for listing the authenticated user's bank accounts.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn list_bank_accounts(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<BankAccount>>, AppError> {
    let connection = state.db_connection().lock().unwrap();

    let accounts = BankAccount::select_by_user(user.id(), &connection)?;

    Ok(Json(accounts))
}

/// A route handler for creating a new bank account owned by the authenticated user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_bank_account(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(new_account): Json<NewBankAccount>,
) -> Result<impl IntoResponse, AppError> {
    let data = new_account.validate().map_err(AppError::Validation)?;

    let connection = state.db_connection().lock().unwrap();

    let account = BankAccount::insert(data, user.id(), &connection)?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// A route handler for getting one of the authenticated user's bank accounts by ID.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_bank_account(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<DatabaseID>,
) -> Result<Json<BankAccount>, AppError> {
    let connection = state.db_connection().lock().unwrap();

    let account = BankAccount::select(id, user.id(), &connection).map_err(account_not_found)?;

    Ok(Json(account))
}

/// A route handler for overwriting one of the authenticated user's bank accounts.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_bank_account(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<DatabaseID>,
    Json(new_account): Json<NewBankAccount>,
) -> Result<Json<BankAccount>, AppError> {
    let data = new_account.validate().map_err(AppError::Validation)?;

    let connection = state.db_connection().lock().unwrap();

    let account =
        BankAccount::update(id, user.id(), data, &connection).map_err(account_not_found)?;

    Ok(Json(account))
}

/// A route handler for deleting one of the authenticated user's bank accounts along with all of
/// its transactions.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn delete_bank_account(
    State(state): State<AppConfig>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<DatabaseID>,
) -> Result<StatusCode, AppError> {
    let mut connection = state.db_connection().lock().unwrap();

    BankAccount::delete(id, user.id(), &mut connection).map_err(account_not_found)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::{
        auth::AuthResponse, config::AppConfig, db::initialize, models::BankAccount,
        routing::build_router,
    };

    fn get_test_app_config() -> AppConfig {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&db_connection).expect("Could not initialize database.");

        AppConfig::new(db_connection, "foobar")
    }

    async fn register_user(server: &TestServer, email: &str) -> AuthResponse {
        let response = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&json!({
                "email": email,
                "password": "secret1",
                "first_name": "A",
                "last_name": "B",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);

        response.json::<AuthResponse>()
    }

    async fn create_app_with_user() -> (TestServer, AppConfig, String) {
        let config = get_test_app_config();
        let server = TestServer::new(build_router().with_state(config.clone()));

        let auth = register_user(&server, "a@b.com").await;

        (server, config, auth.token)
    }

    async fn create_account(server: &TestServer, token: &str) -> BankAccount {
        let response = server
            .post("/bank_accounts")
            .authorization_bearer(token)
            .content_type("application/json")
            .json(&json!({
                "name": "Main",
                "account_type": "checking",
                "balance": "100.00",
                "currency": "USD",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);

        response.json::<BankAccount>()
    }

    #[tokio::test]
    async fn create_and_get_bank_account() {
        let (server, _, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        assert_eq!(account.name, "Main");
        assert_eq!(account.balance, dec!(100.00));

        let response = server
            .get(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<BankAccount>(), account);
    }

    #[tokio::test]
    async fn list_only_returns_own_accounts() {
        let (server, _, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        let other = register_user(&server, "other@b.com").await;
        create_account(&server, &other.token).await;

        let response = server
            .get("/bank_accounts")
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Vec<BankAccount>>(), vec![account]);
    }

    #[tokio::test]
    async fn create_fails_with_validation_messages() {
        let (server, _, token) = create_app_with_user().await;

        let response = server
            .post("/bank_accounts")
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({ "name": "Main", "account_type": "offshore", "balance": "0" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        response.assert_json(&json!({
            "errors": [
                "Account type is not included in the list",
                "Currency can't be blank",
            ]
        }));

        // Nothing was persisted.
        let accounts = server
            .get("/bank_accounts")
            .authorization_bearer(&token)
            .await
            .json::<Vec<BankAccount>>();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn create_ignores_unknown_fields() {
        let (server, _, token) = create_app_with_user().await;

        let response = server
            .post("/bank_accounts")
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({
                "name": "Main",
                "account_type": "savings",
                "balance": "1.00",
                "currency": "USD",
                "is_admin": true,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn update_bank_account_overwrites_fields() {
        let (server, _, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        let response = server
            .put(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({
                "name": "Emergency fund",
                "account_type": "savings",
                "balance": "42.42",
                "currency": "NZD",
            }))
            .await;

        response.assert_status_ok();

        let updated = response.json::<BankAccount>();
        assert_eq!(updated.name, "Emergency fund");
        assert_eq!(updated.balance, dec!(42.42));
    }

    #[tokio::test]
    async fn delete_bank_account_removes_it() {
        let (server, _, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        server
            .delete(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_bank_account_removes_its_transactions() {
        let (server, config, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        server
            .post(&format!("/bank_accounts/{}/transactions", account.id))
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({
                "amount": "30.00",
                "transaction_type": "expense",
                "category": "food",
                "date": "2025-03-30T12:00:00Z",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .delete(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let orphan_count: i64 = config
            .db_connection()
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM \"transaction\" WHERE bank_account_id = ?1",
                (account.id,),
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(orphan_count, 0);
    }

    #[tokio::test]
    async fn other_users_account_is_reported_as_not_found() {
        let (server, _, token) = create_app_with_user().await;

        let account = create_account(&server, &token).await;

        let other = register_user(&server, "other@b.com").await;

        let expected = json!({ "errors": ["Bank account not found"] });

        let get = server
            .get(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&other.token)
            .await;
        get.assert_status_not_found();
        get.assert_json(&expected);

        let update = server
            .put(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&other.token)
            .content_type("application/json")
            .json(&json!({
                "name": "Stolen",
                "account_type": "checking",
                "balance": "0",
                "currency": "USD",
            }))
            .await;
        update.assert_status_not_found();

        let delete = server
            .delete(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&other.token)
            .await;
        delete.assert_status_not_found();

        // The account is untouched for its owner.
        let mine = server
            .get(&format!("/bank_accounts/{}", account.id))
            .authorization_bearer(&token)
            .await;
        mine.assert_status_ok();
        assert_eq!(mine.json::<BankAccount>(), account);
    }
}
