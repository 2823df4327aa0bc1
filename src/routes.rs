use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers,
    middleware_layer::{self, cors::cors_layer},
    state::AppState,
};

/// Builds the application.
///
/// Requests pass, outermost first: tracing, the production HTTPS redirect,
/// cookies, CORS, error rendering, panic recovery, the origin guard, session
/// load/save, then the router. Only the user resource sits behind the login
/// gate.
pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/users", get(handlers::users::index).post(handlers::users::create))
        .route("/users/new", get(handlers::users::new_form))
        .route(
            "/users/{id}",
            get(handlers::users::show)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route("/users/{id}/edit", get(handlers::users::edit_form))
        .route("/users/{id}/update", post(handlers::users::update))
        .route("/users/{id}/delete", post(handlers::users::delete))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_login,
        ));

    let cors = cors_layer(&state.origin_policy, state.config.cors_max_age);

    Router::new()
        .route("/", get(handlers::home::index))
        .route("/auth", get(handlers::auth::begin))
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/logout", get(handlers::auth::logout))
        .merge(user_routes)
        .nest_service("/assets", ServeDir::new("public"))
        .fallback(handlers::home::not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::session::load_session,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_origin,
        ))
        .layer(CatchPanicLayer::custom(middleware_layer::errors::panic_response))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::errors::render_errors,
        ))
        .layer(cors)
        .layer(CookieManagerLayer::new())
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::https::require_https,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .with_state(state)
}
