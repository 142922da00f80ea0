use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{health_check, pending, published, route_not_found};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let pending_routes = Router::new()
        .route("/", post(pending::submit_event).get(pending::list_events))
        .route("/pending", get(pending::list_pending))
        .route("/organizer/:organizer_id", get(pending::list_by_organizer))
        .route(
            "/:id",
            get(pending::get_event)
                .put(pending::update_event)
                .delete(pending::delete_event),
        )
        .route("/:id/approve", post(pending::approve_event))
        .route("/:id/reject", post(pending::reject_event));

    let published_routes = Router::new()
        .route("/", get(published::list_events))
        .route("/latest", get(published::latest_events))
        .route("/search", get(published::search_events))
        .route(
            "/:id",
            get(published::get_event).delete(published::delete_event),
        )
        .route("/:id/tickets", get(published::event_tickets));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/events-pending", pending_routes)
        .nest("/api/events", published_routes)
        .fallback(route_not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config))
        .layer(create_cors_layer(config))
}
