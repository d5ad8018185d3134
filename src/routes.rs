// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{category, comment, post as post_handlers, user},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (comments, posts, categories, users).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:5173".parse().unwrap(),
        "http://127.0.0.1:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Reply listings stay public so orphaned replies remain readable.
    let comment_routes = Router::new()
        .route("/{id}/replies", get(comment::get_comment_replies))
        .merge(
            Router::new()
                .route("/create", post(comment::create_comment))
                .route("/reply", post(comment::create_reply))
                // Admin-only; the permission check lives in the handler.
                .route("/", get(comment::get_comments))
                .route(
                    "/{id}",
                    put(comment::edit_comment).delete(comment::delete_comment),
                )
                .route("/{id}/like", put(comment::like_comment))
                .route("/{id}/dislike", put(comment::dislike_comment))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let post_routes = Router::new()
        .route("/", get(post_handlers::get_posts))
        .route("/{post_id}/comments", get(comment::get_post_comments))
        .merge(
            Router::new()
                .route("/create", post(post_handlers::create_post))
                .route(
                    "/{post_id}",
                    put(post_handlers::update_post).delete(post_handlers::delete_post),
                )
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let category_routes = Router::new()
        .route("/", get(category::get_categories))
        .merge(
            Router::new()
                .route("/create", post(category::create_category))
                .route(
                    "/{id}",
                    put(category::update_category).delete(category::delete_category),
                )
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let user_routes = Router::new().route("/{id}", get(user::get_user));

    Router::new()
        .nest("/api/comments", comment_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/categories", category_routes)
        .nest("/api/users", user_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
