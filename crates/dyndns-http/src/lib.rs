// # HTTP API
//
// This crate exposes the update callback and the owner-facing record
// management routes over HTTP.
//
// ## Routes
//
// All routes live under `/api/dynamicdns`:
//
// | Method | Path                       | Purpose                         |
// |--------|----------------------------|---------------------------------|
// | GET    | `/update`                  | Update callback (token auth)    |
// | POST   | `/create`                  | Register a domain               |
// | DELETE | `/:id?userId=`             | Delete a domain                 |
// | GET    | `/list?userId=`            | List an owner's domains         |
// | POST   | `/regenerate-token/:id`    | Issue a new update token        |
// | GET    | `/client-ip`               | Echo the caller's address       |
//
// ## Security Requirements
//
// - Update tokens NEVER appear in logs
// - A failed update callback never says whether the domain or the token was wrong
// - Store errors are reported with a generic message
//
// The owner id is taken from the request as-is; authenticating the account
// is the job of whatever sits in front of this API.

pub mod error;
pub mod handlers;

use axum::Router;
use axum::routing::{delete, get, post};
use dyndns_core::entitlement::AccountDirectory;
use dyndns_core::{RecordService, UpdateResolver};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;

/// Base path of every route
pub const API_BASE: &str = "/api/dynamicdns";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub resolver: UpdateResolver,
    pub service: RecordService,
    pub accounts: Arc<dyn AccountDirectory>,
}

impl AppState {
    pub fn new(
        resolver: UpdateResolver,
        service: RecordService,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self {
            resolver,
            service,
            accounts,
        }
    }
}

/// Build the router
///
/// Handlers read the peer address, so the router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/update", get(handlers::update))
        .route("/create", post(handlers::create))
        .route("/list", get(handlers::list))
        .route("/client-ip", get(handlers::client_ip))
        .route("/regenerate-token/:id", post(handlers::regenerate_token))
        .route("/:id", delete(handlers::delete));

    Router::new()
        .nest(API_BASE, api)
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Serve the API until the shutdown signal fires
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), dyndns_core::Error> {
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
        info!("HTTP server shutting down");
    })
    .await?;

    Ok(())
}
