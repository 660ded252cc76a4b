//! Token issuance and the authentication gate.
//!
//! This module defines the JSON Web Token claims, the `/auth/register` and `/auth/login`
//! handlers, and the [AuthenticatedUser] extractor that resolves the bearer token on every
//! protected request before the resource handlers run.

use axum::{
    Json, RequestPartsExt,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    db::DbError,
    error::AppError,
    models::{NewUser, PasswordHash, User, UserID, UserResponse},
};

/// How long a bearer token stays valid after it is issued.
const TOKEN_DURATION_HOURS: i64 = 24;

/// The contents of a JSON Web Token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub user_id: UserID,
    /// The expiry time of the token as a unix timestamp.
    pub exp: usize,
    /// The time the token was issued as a unix timestamp.
    pub iat: usize,
}

/// Sign a bearer token for `user_id`, valid for [TOKEN_DURATION_HOURS].
pub fn encode_jwt(user_id: UserID, encoding_key: &EncodingKey) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        user_id,
        exp: (now + Duration::hours(TOKEN_DURATION_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(&Header::default(), &claims, encoding_key)
        .map_err(|e| AppError::TokenCreation(e.to_string()))
}

/// Verify a bearer token's signature and expiry and return its claims.
///
/// The error message carries the underlying decode error so clients can tell an expired token
/// from a malformed one.
pub fn decode_jwt(token: &str, decoding_key: &DecodingKey) -> Result<Claims, AppError> {
    decode::<Claims>(token, decoding_key, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|e| AppError::Unauthenticated(e.to_string()))
}

/// The user resolved from the request's bearer token.
///
/// Using this type as a handler argument is what gates a route: extraction fails with a 401
/// before the handler body runs if the `Authorization` header is missing, the token does not
/// verify, or the token's user no longer exists. The resolved user is passed explicitly into the
/// handler and scopes every query it makes.
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthenticated("Invalid authorization header".to_owned()))?;

        let config = AppConfig::from_ref(state);
        let claims = decode_jwt(bearer.token(), config.decoding_key())?;

        let connection = config.db_connection().lock().unwrap();

        // A token for a deleted user gets the same response as a bad token so that this endpoint
        // cannot be used to check whether an account still exists.
        let user = User::select_by_id(claims.user_id, &connection).map_err(|e| match e {
            DbError::NotFound => AppError::Unauthenticated("Invalid token".to_owned()),
            e => AppError::Database(e),
        })?;

        Ok(AuthenticatedUser(user))
    }
}

/// The response body for successful registration and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The signed bearer token to present on subsequent requests.
    pub token: String,
    /// The authenticated user, without the password hash.
    pub user: UserResponse,
}

/// A route handler for registering a new user.
///
/// Responds with 201 and an [AuthResponse] on success, or 422 with one message per violated
/// validation rule.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn register(
    State(state): State<AppConfig>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    let data = new_user
        .validate(PasswordHash::DEFAULT_COST)
        .map_err(AppError::Validation)?;

    let connection = state.db_connection().lock().unwrap();

    let user = User::insert(data, &connection).map_err(|e| match e {
        DbError::DuplicateEmail => {
            AppError::Validation(vec!["Email has already been taken".to_owned()])
        }
        e => AppError::Database(e),
    })?;

    let token = encode_jwt(user.id(), state.encoding_key())?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from(&user),
        }),
    ))
}

/// The credentials accepted by the login endpoint.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A route handler for exchanging an email/password pair for a bearer token.
///
/// A wrong password and an unknown email produce the identical generic 401 response, so login
/// cannot be used to probe which emails are registered.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn login(
    State(state): State<AppConfig>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
    let (Some(email), Some(password)) = (credentials.email, credentials.password) else {
        return Err(AppError::InvalidCredentials);
    };

    let connection = state.db_connection().lock().unwrap();

    let user = User::select_by_email(&email, &connection).map_err(|e| match e {
        DbError::NotFound => AppError::InvalidCredentials,
        e => AppError::Database(e),
    })?;

    if !user.password_hash().verify(&password)? {
        return Err(AppError::InvalidCredentials);
    }

    let token = encode_jwt(user.id(), state.encoding_key())?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

#[cfg(test)]
mod jwt_tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use rusqlite::Connection;

    use crate::{config::AppConfig, db::initialize, error::AppError, models::UserID};

    use super::{Claims, decode_jwt, encode_jwt};

    fn get_test_app_config() -> AppConfig {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&db_connection).expect("Could not initialize database.");

        AppConfig::new(db_connection, "foobar")
    }

    #[test]
    fn decode_jwt_gives_back_user_id() {
        let config = get_test_app_config();
        let user_id = UserID::new(42);

        let token = encode_jwt(user_id, config.encoding_key()).unwrap();
        let claims = decode_jwt(&token, config.decoding_key()).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn decode_jwt_fails_for_garbage_token() {
        let config = get_test_app_config();

        let result = decode_jwt("not.a.token", config.decoding_key());

        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn decode_jwt_fails_for_wrong_secret() {
        let config = get_test_app_config();

        let token = encode_jwt(UserID::new(1), config.encoding_key()).unwrap();
        let other_config = AppConfig::new(Connection::open_in_memory().unwrap(), "other secret");

        assert!(decode_jwt(&token, other_config.decoding_key()).is_err());
    }

    #[test]
    fn decode_jwt_fails_for_expired_token() {
        let config = get_test_app_config();

        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: UserID::new(1),
            exp: (now - 3600) as usize,
            iat: (now - 7200) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("foobar".as_ref()),
        )
        .unwrap();

        assert!(decode_jwt(&token, config.decoding_key()).is_err());
    }
}

#[cfg(test)]
mod endpoint_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{config::AppConfig, db::initialize, routing::build_router};

    use super::{AuthResponse, decode_jwt};

    fn get_test_app_config() -> AppConfig {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&db_connection).expect("Could not initialize database.");

        AppConfig::new(db_connection, "foobar")
    }

    fn new_test_server(config: AppConfig) -> TestServer {
        TestServer::new(build_router().with_state(config))
    }

    fn register_body() -> Value {
        json!({
            "email": "a@b.com",
            "password": "secret1",
            "first_name": "A",
            "last_name": "B",
        })
    }

    #[tokio::test]
    async fn register_succeeds_and_issues_token() {
        let config = get_test_app_config();
        let server = new_test_server(config.clone());

        let response = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await;

        response.assert_status(StatusCode::CREATED);

        let body = response.json::<AuthResponse>();
        assert_eq!(body.user.email.as_str(), "a@b.com");

        let claims = decode_jwt(&body.token, config.decoding_key()).unwrap();
        assert_eq!(claims.user_id, body.user.id);
    }

    #[tokio::test]
    async fn register_response_does_not_contain_password() {
        let server = new_test_server(get_test_app_config());

        let response = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await;

        response.assert_status(StatusCode::CREATED);

        let body = response.json::<Value>();
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_fails_with_validation_messages() {
        let server = new_test_server(get_test_app_config());

        let response = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&json!({ "email": "not-an-email", "password": "secret1" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        response.assert_json(&json!({
            "errors": [
                "Email is invalid",
                "First name can't be blank",
                "Last name can't be blank",
            ]
        }));
    }

    #[tokio::test]
    async fn register_fails_on_duplicate_email() {
        let server = new_test_server(get_test_app_config());

        server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        response.assert_json(&json!({ "errors": ["Email has already been taken"] }));
    }

    #[tokio::test]
    async fn login_succeeds_with_valid_credentials() {
        let config = get_test_app_config();
        let server = new_test_server(config.clone());

        let registered = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await
            .json::<AuthResponse>();

        let response = server
            .post("/auth/login")
            .content_type("application/json")
            .json(&json!({ "email": "a@b.com", "password": "secret1" }))
            .await;

        response.assert_status_ok();

        let body = response.json::<AuthResponse>();
        assert_eq!(body.user, registered.user);

        let claims = decode_jwt(&body.token, config.decoding_key()).unwrap();
        assert_eq!(claims.user_id, registered.user.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let server = new_test_server(get_test_app_config());

        server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await
            .assert_status(StatusCode::CREATED);

        let wrong_password = server
            .post("/auth/login")
            .content_type("application/json")
            .json(&json!({ "email": "a@b.com", "password": "wrong!!" }))
            .await;
        let unknown_email = server
            .post("/auth/login")
            .content_type("application/json")
            .json(&json!({ "email": "nobody@b.com", "password": "secret1" }))
            .await;

        wrong_password.assert_status(StatusCode::UNAUTHORIZED);
        unknown_email.assert_status(StatusCode::UNAUTHORIZED);

        let expected = json!({ "errors": ["Invalid email or password"] });
        wrong_password.assert_json(&expected);
        unknown_email.assert_json(&expected);
    }

    #[tokio::test]
    async fn protected_route_fails_without_token() {
        let server = new_test_server(get_test_app_config());

        server
            .get("/bank_accounts")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_fails_with_garbage_token() {
        let server = new_test_server(get_test_app_config());

        server
            .get("/bank_accounts")
            .authorization_bearer("garbage")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_succeeds_with_valid_token() {
        let server = new_test_server(get_test_app_config());

        let registered = server
            .post("/auth/register")
            .content_type("application/json")
            .json(&register_body())
            .await
            .json::<AuthResponse>();

        server
            .get("/bank_accounts")
            .authorization_bearer(registered.token)
            .await
            .assert_status_ok();
    }
}
