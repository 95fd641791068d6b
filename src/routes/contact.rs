use axum::{extract::State, http::StatusCode, Json};

use crate::{
    models::{auth::AuthenticatedUser, contact::SubmitContactRequest},
    services::submission::{Notice, SubmissionOutcome},
    AppState,
};

/// PUT /api/contact — save the caller's WhatsApp number and forward it.
pub async fn submit_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SubmitContactRequest>,
) -> (StatusCode, Json<Notice>) {
    let form = state.forms.form_for(&user.email);
    let outcome = form
        .submit(&body.whatsapp, state.contacts.as_ref(), state.forwarder.as_ref())
        .await;

    let status = match outcome {
        SubmissionOutcome::Success | SubmissionOutcome::ForwardFailed => StatusCode::OK,
        SubmissionOutcome::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionOutcome::Busy => StatusCode::CONFLICT,
        SubmissionOutcome::PersistFailed | SubmissionOutcome::Unexpected => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(Notice::from(&outcome)))
}
