use std::{env, net::SocketAddr};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use finledger::{AppConfig, build_router, db, graceful_shutdown};

/// The REST API server for finledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let jwt_secret =
        env::var("JWT_SECRET").expect("The environment variable 'JWT_SECRET' must be set.");

    let conn = Connection::open(&args.db_path).expect("Could not open database.");
    ensure_initialized(&conn);

    let app_config = AppConfig::new(conn, &jwt_secret);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router().with_state(app_config));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly.");
}

/// Create the schema on first run, otherwise just re-enable foreign key enforcement, which
/// SQLite turns off for every new connection.
fn ensure_initialized(conn: &Connection) {
    let user_table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'user'",
            [],
            |row| row.get(0),
        )
        .expect("Could not inspect database schema.");

    if user_table_count == 0 {
        db::initialize(conn).expect("Could not initialize database.");
    } else {
        conn.pragma_update(None, "foreign_keys", true)
            .expect("Could not enable foreign keys.");
    }
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        let method = req.method();
        let uri = req.uri();

        let matched_path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched_path| matched_path.as_str());

        tracing::debug_span!("request", %method, %uri, matched_path)
    });

    router.layer(tracing_layer)
}
