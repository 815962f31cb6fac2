pub mod attempts;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::auth::require_bearer_auth;
use crate::AppState;

/// The full HTTP surface. Everything except health and the public test list
/// requires a bearer token.
pub fn app(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/api/tests", get(tests::list_tests));

    let learner_api = Router::new()
        .route("/api/tests", post(tests::create_test))
        .route(
            "/api/tests/:id",
            get(tests::get_test)
                .patch(tests::update_test)
                .delete(tests::delete_test),
        )
        .route("/api/tests/:id/start", post(attempts::start_test))
        .route("/api/tests/:id/question", get(attempts::current_question))
        .route("/api/tests/:id/answer", post(attempts::submit_answer))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer_auth,
        ));

    public_api
        .merge(learner_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
