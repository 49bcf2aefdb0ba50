use crate::{
    auth::Caller,
    errors::AppError,
    models::feedback::{Feedback, NewFeedback},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};

/// `POST /feedback`
pub async fn submit_feedback(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Json(input): Json<NewFeedback>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let feedback = state.feedback.submit(caller.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// `GET /feedback`
pub async fn list_feedback(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Feedback>>, AppError> {
    Ok(Json(state.feedback.list(&caller).await?))
}
