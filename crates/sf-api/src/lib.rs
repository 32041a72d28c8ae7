pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use state::ApiState;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Build the complete API router with all `/api/*` routes.
///
/// Non-API requests are served from `web_dist_path` (dashboard SPA).
/// Any path that doesn't match a static file falls back to `index.html` (200).
pub fn build_router(state: ApiState) -> Router {
    let web_dist = state.env.web_dist_path.clone();
    let index_html = web_dist.join("index.html");

    let spa_fallback = ServeDir::new(&web_dist)
        .fallback(ServeFile::new(&index_html));

    Router::new()
        .nest("/api", api_routes())
        .with_state(state)
        .fallback_service(spa_fallback)
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<ApiState> {
    Router::new()
        .nest("/servers", routes::servers::router())
        .nest("/route-servers", routes::route_servers::router())
        .merge(routes::rules::router())
        .merge(routes::operations::router())
        .merge(routes::health::router())
}
