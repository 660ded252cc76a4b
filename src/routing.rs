//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    auth::{login, register},
    bank_accounts::{
        create_bank_account, delete_bank_account, get_bank_account, list_bank_accounts,
        update_bank_account,
    },
    config::AppConfig,
    transactions::{
        create_transaction, delete_transaction, get_transaction, list_transactions,
        update_transaction,
    },
};

/// Return a router with all the app's routes.
///
/// The auth routes are the only ones reachable without a bearer token: every other handler
/// extracts an [crate::auth::AuthenticatedUser] and therefore rejects unauthenticated requests
/// before running.
pub fn build_router() -> Router<AppConfig> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route(
            "/bank_accounts",
            get(list_bank_accounts).post(create_bank_account),
        )
        .route(
            "/bank_accounts/{id}",
            get(get_bank_account)
                .put(update_bank_account)
                .delete(delete_bank_account),
        )
        .route(
            "/bank_accounts/{bank_account_id}/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/bank_accounts/{bank_account_id}/transactions/{id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}
