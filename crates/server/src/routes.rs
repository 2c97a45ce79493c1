//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Layers run top to bottom: trace, then the token gate.
    let protected = Router::new()
        .route(
            "/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/list", get(handlers::list_files))
        .route("/heartbeat", get(handlers::heartbeat))
        .route("/", get(handlers::missing_key))
        .route("/{key}", get(handlers::get_file))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let mut router = Router::new().merge(protected);

    // Unauthenticated for Prometheus; restrict at the network level.
    if state.config.server.metrics_enabled {
        register_metrics();
        let metrics_routes = Router::new()
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http());
        router = router.merge(metrics_routes);
    }

    router.with_state(state)
}
