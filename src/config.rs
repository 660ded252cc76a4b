//! Implements the struct that holds the state shared by all request handlers.

use std::sync::{Arc, Mutex};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rusqlite::Connection;

/// The keys used for signing and verifying JSON Web Tokens.
///
/// Both keys are derived from the same server-held secret (HMAC-SHA256).
#[derive(Clone)]
struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// The application state: the database connection and the token signing keys.
///
/// The JWT secret is consumed at construction time and only the derived keys are kept, so the
/// secret cannot leak through this struct.
#[derive(Clone)]
pub struct AppConfig {
    db_connection: Arc<Mutex<Connection>>,
    jwt_keys: JwtKeys,
}

impl AppConfig {
    /// Create a new [AppConfig] from an open database connection and the JWT signing secret.
    pub fn new(db_connection: Connection, jwt_secret: &str) -> AppConfig {
        AppConfig {
            db_connection: Arc::new(Mutex::new(db_connection)),
            jwt_keys: JwtKeys {
                encoding_key: EncodingKey::from_secret(jwt_secret.as_ref()),
                decoding_key: DecodingKey::from_secret(jwt_secret.as_ref()),
            },
        }
    }

    /// The shared database connection.
    pub fn db_connection(&self) -> &Mutex<Connection> {
        &self.db_connection
    }

    /// The encoding key for JWTs.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.jwt_keys.encoding_key
    }

    /// The decoding key for JWTs.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.jwt_keys.decoding_key
    }
}
