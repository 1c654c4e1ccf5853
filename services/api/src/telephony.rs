//! Twilio REST Client and TwiML
//!
//! Outbound call placement and SMS delivery via Twilio's REST API, plus the
//! TwiML documents served to the voice webhook. Calls are created with a
//! status callback subscribed to the terminal lifecycle events so sessions
//! are closed out even when the caller hangs up mid-interview.

use crate::config::Config;
use aldea_core::session::Language;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Deserialize, Debug)]
pub struct CallResource {
    pub sid: String,
}

#[derive(Deserialize, Debug)]
pub struct MessageResource {
    pub sid: String,
}

pub struct TwilioClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_phone_number.clone(),
        }
    }

    /// Places an outbound call that fetches its TwiML from this service's
    /// voice webhook for the given session.
    pub async fn start_call(
        &self,
        to: &str,
        session_id: &str,
        backend_url: &str,
    ) -> Result<CallResource> {
        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Calls.json",
            self.account_sid
        );
        let voice_url = format!("{backend_url}/api/twilio/voice/{session_id}");
        let status_url = format!("{backend_url}/api/twilio/status/{session_id}");
        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Url", voice_url.as_str()),
            ("Method", "POST"),
            ("StatusCallback", status_url.as_str()),
            ("StatusCallbackMethod", "POST"),
            ("StatusCallbackEvent", "initiated"),
            ("StatusCallbackEvent", "ringing"),
            ("StatusCallbackEvent", "answered"),
            ("StatusCallbackEvent", "completed"),
        ];

        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("call placement request failed")?
            .error_for_status()
            .context("call placement rejected")?;
        let call: CallResource = response.json().await?;
        info!(call_sid = %call.sid, session_id, "outbound call placed");
        Ok(call)
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<MessageResource> {
        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.account_sid
        );
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("SMS request failed")?
            .error_for_status()
            .context("SMS rejected")?;
        let message: MessageResource = response.json().await?;
        info!(message_sid = %message.sid, "SMS sent");
        Ok(message)
    }
}

/// TwiML connecting the call to this service's media-stream WebSocket.
pub fn media_stream_twiml(backend_url: &str, session_id: &str) -> String {
    let ws_base = backend_url
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Connect>\
         <Stream url=\"{ws_base}/api/twilio/media-stream/{session_id}\"/>\
         </Connect></Response>"
    )
}

/// TwiML served when a call cannot be connected to a session.
pub fn error_twiml() -> &'static str {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
     <Response><Say>Sorry, there was an error. Goodbye.</Say></Response>"
}

/// Body of the post-call SMS carrying the review-form link.
pub fn form_sms_body(
    language: Language,
    first_name: &str,
    frontend_url: &str,
    session_id: &str,
) -> String {
    let link = format!("{frontend_url}/form/{session_id}");
    match language {
        Language::English => format!(
            "Hi {first_name}, thanks for completing your health assessment. \
             Review and submit your answers here: {link}"
        ),
        Language::Spanish => format!(
            "Hola {first_name}, gracias por completar su evaluación de salud. \
             Revise y envíe sus respuestas aquí: {link}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_points_at_media_stream_websocket() {
        let twiml = media_stream_twiml("https://aldea.example.com", "abc-123");
        assert!(twiml.contains("wss://aldea.example.com/api/twilio/media-stream/abc-123"));
        assert!(twiml.starts_with("<?xml"));
        assert!(twiml.contains("<Connect>"));

        // Plain http (local tunnels) downgrades to ws.
        let twiml = media_stream_twiml("http://localhost:3000", "abc-123");
        assert!(twiml.contains("ws://localhost:3000/api/twilio/media-stream/abc-123"));
    }

    #[test]
    fn error_twiml_is_valid_shape() {
        assert!(error_twiml().contains("<Say>"));
    }

    #[test]
    fn sms_body_localized_with_link() {
        let body = form_sms_body(
            Language::Spanish,
            "Maria",
            "https://forms.example.com",
            "abc",
        );
        assert!(body.contains("Maria"));
        assert!(body.contains("https://forms.example.com/form/abc"));
        assert!(body.contains("gracias"));
    }
}
