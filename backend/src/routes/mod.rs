//! Route definitions for the Farm Management Platform

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Multipart framing allowance on top of the image size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .nest("/farms", farm_routes(&state))
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::upsert_profile),
        )
        .nest("/advisor", advisor_routes())
        .nest("/chat", chat_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .merge(protected)
}

/// Farm and gate valve routes (protected)
fn farm_routes(state: &AppState) -> Router<AppState> {
    let image_limit = state.config.uploads.max_map_image_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handlers::list_farms).post(handlers::create_farm))
        .route("/events", get(handlers::farm_events))
        .route(
            "/:farm_id",
            get(handlers::get_farm)
                .put(handlers::update_farm)
                .delete(handlers::delete_farm),
        )
        .route(
            "/:farm_id/map-image",
            get(handlers::get_map_image)
                .put(handlers::upload_map_image)
                .delete(handlers::delete_map_image)
                .layer(DefaultBodyLimit::max(image_limit)),
        )
        .route(
            "/:farm_id/valves",
            get(handlers::list_valves).post(handlers::add_valve),
        )
        .route(
            "/:farm_id/valves/:valve_id",
            put(handlers::update_valve).delete(handlers::delete_valve),
        )
        .route(
            "/:farm_id/valves/:valve_id/toggle",
            post(handlers::toggle_valve),
        )
        .route(
            "/:farm_id/valves/:valve_id/status",
            put(handlers::set_valve_status),
        )
}

/// Advisor routes (protected)
fn advisor_routes() -> Router<AppState> {
    Router::new()
        .route("/weather", post(handlers::weather_forecast))
        .route("/crops", get(handlers::crop_recommendations))
}

/// Chat routes (protected)
fn chat_routes() -> Router<AppState> {
    Router::new().route("/", post(handlers::send_message)).route(
        "/history",
        get(handlers::chat_history).delete(handlers::clear_chat_history),
    )
}
