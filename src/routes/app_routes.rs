// src/routes/app_routes.rs

use std::time::Duration;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::app_state::AppState;
use crate::handlers::invitation_handlers::{
    accept_invite, admin_get_invite, create_invite, decline_invite, delete_invite, edit_invite, list_own_invites,
    list_upcoming, lookup_invite,
};
use crate::middleware::auth_middleware::{auth_middleware, optional_auth_middleware};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/invites",
            post(create_invite)
                .route_layer(from_fn(optional_auth_middleware))
                .merge(get(list_own_invites).route_layer(from_fn(auth_middleware))),
        )
        .route("/invites/upcoming", get(list_upcoming).route_layer(from_fn(auth_middleware)))
        // `:key` is the share token for GET and the invite id for PUT/DELETE.
        .route(
            "/invites/:key",
            get(lookup_invite).merge(
                put(edit_invite)
                    .delete(delete_invite)
                    .route_layer(from_fn(auth_middleware)),
            ),
        )
        .route("/invites/:key/accept", post(accept_invite))
        .route("/invites/:key/decline", post(decline_invite))
        .route(
            "/admin/invites/:id",
            get(admin_get_invite).route_layer(from_fn(auth_middleware)),
        )
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
