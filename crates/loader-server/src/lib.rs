pub mod console;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use loader_core::{Shutdown, StatusProjector};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router for the status endpoint.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(projector: StatusProjector, include_output: bool) -> Router {
    let app_state = state::AppState::new(projector, include_output);

    // Browsers on the device's local UI fetch from another port.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::HEAD]);

    Router::new()
        .route("/", get(routes::status::get_status))
        .route("/api/status", get(routes::status::get_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the status endpoint on a pre-bound listener until `shutdown` fires.
///
/// The listener is bound by the caller so it can report the actual port
/// (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    projector: StatusProjector,
    include_output: bool,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(projector, include_output);

    tracing::info!("status endpoint listening on http://0.0.0.0:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;
    tracing::info!("status endpoint stopped");
    Ok(())
}
