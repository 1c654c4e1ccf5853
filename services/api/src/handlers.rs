//! HTTP Handlers
//!
//! The REST surface for launching calls plus the Twilio webhooks. The voice
//! webhook always answers with TwiML, even on failure, so the caller hears a
//! spoken error instead of dead air.

use crate::state::AppState;
use crate::telephony::{error_twiml, form_sms_body, media_stream_twiml};
use aldea_core::session::Language;
use axum::{
    Json,
    extract::{Form, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Standard error payload for API responses.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub enum ApiError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(error) => {
                error!(error = ?error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        ApiError::Internal(error.into())
    }
}

#[derive(Deserialize)]
pub struct StartCallPayload {
    pub first_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Serialize)]
pub struct StartCallResponse {
    pub session_id: String,
    pub call_sid: String,
}

/// `POST /api/calls`: creates a session and places the outbound call.
pub async fn start_call(
    State(state): State<AppState>,
    Json(payload): Json<StartCallPayload>,
) -> Result<(StatusCode, Json<StartCallResponse>), ApiError> {
    let language = payload.language.unwrap_or_default();
    let session = state
        .store
        .create(&payload.first_name, &payload.phone_number, language)
        .await?;
    info!(session_id = %session.session_id, "session created");

    let call = state
        .telephony
        .start_call(
            &payload.phone_number,
            &session.session_id,
            &state.config.backend_url,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartCallResponse {
            session_id: session.session_id,
            call_sid: call.sid,
        }),
    ))
}

/// `POST /api/twilio/voice/{session_id}`: TwiML fetched by Twilio when the
/// callee answers.
pub async fn voice_webhook(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let body = match state.store.get(&session_id).await {
        Ok(Some(_)) => media_stream_twiml(&state.config.backend_url, &session_id),
        Ok(None) => {
            warn!(session_id, "voice webhook for unknown session");
            error_twiml().to_string()
        }
        Err(error) => {
            error!(session_id, %error, "voice webhook store lookup failed");
            error_twiml().to_string()
        }
    };
    ([(header::CONTENT_TYPE, "application/xml")], body)
}

#[derive(Deserialize)]
pub struct StatusCallbackPayload {
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallDuration", default)]
    pub call_duration: Option<String>,
}

fn is_terminal_status(status: &str) -> bool {
    matches!(
        status,
        "completed" | "failed" | "busy" | "no-answer" | "canceled"
    )
}

/// `POST /api/twilio/status/{session_id}`: call lifecycle events.
///
/// On a terminal status the session is closed out if the dialogue did not
/// already do so; this covers hangups and failed calls. The form SMS is only
/// sent from here when the session was not yet marked complete, so a call
/// that finished normally (where the media-stream hook sends it) never gets
/// a duplicate.
pub async fn status_callback(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Form(payload): Form<StatusCallbackPayload>,
) -> Result<StatusCode, ApiError> {
    info!(
        session_id,
        call_sid = %payload.call_sid,
        status = %payload.call_status,
        duration = payload.call_duration.as_deref().unwrap_or("-"),
        "call status update"
    );

    if !is_terminal_status(&payload.call_status) {
        return Ok(StatusCode::NO_CONTENT);
    }

    let Some(session) = state.store.get(&session_id).await? else {
        warn!(session_id, "status callback for unknown session");
        return Ok(StatusCode::NO_CONTENT);
    };
    if session.call_completed {
        return Ok(StatusCode::NO_CONTENT);
    }

    state.store.mark_call_completed(&session_id).await?;
    if session.opted_in_for_sms {
        if let Some(cell) = &session.cell_phone_for_sms {
            let body = form_sms_body(
                session.language,
                &session.first_name,
                &state.config.frontend_url,
                &session_id,
            );
            if let Err(error) = state.telephony.send_sms(cell, &body).await {
                error!(session_id, %error, "failed to send form SMS from status callback");
            }
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}
