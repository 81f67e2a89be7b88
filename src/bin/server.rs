use std::net::SocketAddr;

use axum::{
    extract::{MatchedPath, Request},
    Router,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coinkeeper::{build_router, graceful_shutdown, initialize_db, AppConfig};

/// The REST API server for the personal finance tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// An optional path prefix to serve all routes under, e.g. '/api/v1'.
    #[arg(long, env = "PATH_NAME")]
    path_prefix: Option<String>,

    /// The secret used to sign and verify auth tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let connection = Connection::open(&args.db_path).expect("Could not open the database file.");
    initialize_db(&connection).expect("Could not initialize the database.");

    let state = AppConfig::new(connection, &args.jwt_secret);

    let router = match &args.path_prefix {
        Some(prefix) => Router::new().nest(prefix, build_router(state)),
        None => build_router(state),
    };
    let router = add_tracing_layer(router);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly.");
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinkeeper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // 5xx responses are already logged where the error is mapped, so the
        // layer's own failure logging is disabled.
        .on_failure(());

    router.layer(tracing_layer)
}
