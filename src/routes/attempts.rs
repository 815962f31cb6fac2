use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::attempt_dto::{AttemptResponse, QuestionResponse, SubmitAnswerRequest},
    error::Result,
    middleware::auth::AuthUser,
    services::attempt_service::Directive,
    AppState,
};

impl IntoResponse for Directive {
    fn into_response(self) -> Response {
        match self {
            Directive::ValidationError { message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "status": "validation_error", "error": message })),
            )
                .into_response(),
            Directive::FatalError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "fatal_error", "error": message })),
            )
                .into_response(),
            other => (StatusCode::OK, Json(other)).into_response(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Attempt started or resumed", body = Json<AttemptResponse>),
        (status = 404, description = "Test not found"),
        (status = 422, description = "Test cannot be taken")
    )
)]
#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.start(user.user_id, id).await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}/question",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Question the attempt currently points at", body = Json<QuestionResponse>),
        (status = 404, description = "No test in progress")
    )
)]
#[axum::debug_handler]
pub async fn current_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (attempt, question, answers) = state
        .attempt_service
        .current_question(user.user_id, id)
        .await?;
    Ok(Json(QuestionResponse::new(&attempt, question, answers)))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/answer",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Next question or final score", body = Json<Directive>),
        (status = 404, description = "No test in progress"),
        (status = 409, description = "Concurrent submission for the same attempt"),
        (status = 422, description = "Selection rejected")
    )
)]
#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Directive> {
    state
        .attempt_service
        .submit(user.user_id, id, &req.selected)
        .await
}
