use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/session", get(handlers::session_info))
        .route("/api/auth/forgot", post(handlers::forgot_password))
        .route("/api/auth/reset", post(handlers::reset_password))
        .route("/api/profile", put(handlers::update_profile))
        .route("/api/users", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/api/users/:id",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        .route(
            "/api/clients",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route(
            "/api/clients/:id",
            put(handlers::update_client).delete(handlers::delete_client),
        )
        .route(
            "/api/clients/:id/houses",
            get(handlers::list_houses).post(handlers::create_house),
        )
        .route(
            "/api/houses/:id",
            put(handlers::update_house).delete(handlers::delete_house),
        )
        .route(
            "/api/houses/:id/consumptions",
            get(handlers::list_consumptions).post(handlers::create_consumption),
        )
        .route(
            "/api/consumptions/:id",
            put(handlers::update_consumption).delete(handlers::delete_consumption),
        )
        .route("/api/dashboard", get(handlers::dashboard))
        .with_state(state)
}
