use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post, put};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .frontend_url
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(handlers::users::list).post(handlers::users::create))
        .route(
            "/api/users/{id}",
            get(handlers::users::get)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route(
            "/api/organizations",
            get(handlers::organizations::list).post(handlers::organizations::create),
        )
        .route(
            "/api/organizations/{id}",
            get(handlers::organizations::get)
                .put(handlers::organizations::update)
                .delete(handlers::organizations::delete),
        )
        .route(
            "/api/tickets",
            get(handlers::tickets::list).post(handlers::tickets::create),
        )
        .route(
            "/api/tickets/{id}",
            get(handlers::tickets::get).put(handlers::tickets::update),
        )
        .route("/api/tickets/{id}/messages", post(handlers::tickets::add_message))
        .route(
            "/api/tickets/{id}/time-entries",
            post(handlers::tickets::add_time_entry),
        )
        .route(
            "/api/tickets/{id}/convert",
            post(handlers::tickets::request_conversion),
        )
        .route("/api/approvals", get(handlers::approvals::list))
        .route("/api/approvals/{id}", put(handlers::approvals::update))
        .route(
            "/api/invoices",
            get(handlers::invoices::list).post(handlers::invoices::create),
        )
        .route("/api/invoices/{id}/status", put(handlers::invoices::set_status))
        .route("/api/dashboard/stats", get(handlers::dashboard::stats))
        .route("/api/dashboard/activities", get(handlers::dashboard::activities))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
