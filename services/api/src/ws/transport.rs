//! Twilio Media-Stream Transport
//!
//! Wire types and the WebSocket handler for Twilio's bidirectional media
//! stream. Inbound frames are JSON envelopes carrying base64 mu-law audio;
//! outbound audio goes back the same way, tagged with the `streamSid`
//! announced by the `start` event. The handler owns the call lifecycle: it
//! waits for the stream to start, runs the voice pipeline, and tears
//! everything down when the stream ends.

use super::pipeline::{CompletionHook, TransportSink, VoicePipeline};
use crate::audio::{self, TRANSPORT_FRAME_BYTES};
use crate::state::AppState;
use crate::stt::RecognitionEvent;
use crate::telephony::form_sms_body;
use aldea_core::dialogue::AssessmentAgent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, instrument, warn};

/// How long to wait for the `start` event before giving up on the stream.
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound frames sent between cooperative yields, so one long utterance
/// cannot monopolize the connection task.
const FRAMES_PER_YIELD: usize = 25;

// Inbound events. Twilio sends more fields than these; only what the service
// reads is modeled, and unknown event types are ignored rather than
// rejected.

#[derive(Deserialize, Debug)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioEvent {
    Connected,
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        #[serde(default)]
        start: Option<StartMeta>,
    },
    Media {
        media: MediaPayload,
    },
    Dtmf {
        dtmf: DtmfPayload,
    },
    Stop,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
pub struct StartMeta {
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct MediaPayload {
    pub payload: String,
}

#[derive(Deserialize, Debug)]
pub struct DtmfPayload {
    pub digit: String,
}

#[derive(Serialize)]
struct OutboundMedia<'a> {
    event: &'a str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
    media: OutboundPayload,
}

#[derive(Serialize)]
struct OutboundPayload {
    payload: String,
}

#[derive(Serialize)]
struct OutboundClear<'a> {
    event: &'a str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
}

/// Serializes a mu-law buffer into outbound media messages, one frame each.
fn media_messages(stream_sid: &str, mulaw: &[u8]) -> Result<Vec<String>> {
    mulaw
        .chunks(TRANSPORT_FRAME_BYTES)
        .map(|frame| {
            serde_json::to_string(&OutboundMedia {
                event: "media",
                stream_sid,
                media: OutboundPayload {
                    payload: audio::encode_base64(frame),
                },
            })
            .context("failed to serialize media message")
        })
        .collect()
}

/// [`TransportSink`] writing to a Twilio media-stream WebSocket.
///
/// Until the `start` event announces the stream id, outbound audio is
/// silently dropped; there is nowhere to address it to yet.
pub struct TwilioSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream_sid: RwLock<Option<String>>,
}

impl TwilioSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
            stream_sid: RwLock::new(None),
        }
    }

    pub async fn set_stream_sid(&self, stream_sid: String) {
        *self.stream_sid.write().await = Some(stream_sid);
    }
}

#[async_trait]
impl TransportSink for TwilioSink {
    async fn send_audio(&self, mulaw: &[u8]) -> Result<()> {
        let stream_sid = self.stream_sid.read().await.clone();
        let Some(stream_sid) = stream_sid else {
            debug!("dropping outbound audio, stream not started");
            return Ok(());
        };
        let messages = media_messages(&stream_sid, mulaw)?;
        let mut sink = self.sink.lock().await;
        for (i, message) in messages.into_iter().enumerate() {
            sink.send(Message::Text(message.into()))
                .await
                .context("media-stream write failed")?;
            if (i + 1) % FRAMES_PER_YIELD == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let stream_sid = self.stream_sid.read().await.clone();
        let Some(stream_sid) = stream_sid else {
            return Ok(());
        };
        let message = serde_json::to_string(&OutboundClear {
            event: "clear",
            stream_sid: &stream_sid,
        })?;
        self.sink
            .lock()
            .await
            .send(Message::Text(message.into()))
            .await
            .context("media-stream clear failed")
    }
}

/// Axum handler upgrading the media-stream connection.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_socket(socket, session_id, state))
}

/// Runs one call's media stream from upgrade to teardown.
#[instrument(name = "media_stream", skip(socket, state), fields(session_id = %session_id))]
async fn handle_media_socket(socket: WebSocket, session_id: String, state: AppState) {
    let session = match state.store.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            warn!("media stream for unknown session");
            return;
        }
        Err(error) => {
            error!(%error, "session lookup failed");
            return;
        }
    };
    info!("media stream connected");

    let (ws_tx, mut ws_rx) = socket.split();
    let sink = Arc::new(TwilioSink::new(ws_tx));

    match tokio::time::timeout(STREAM_START_TIMEOUT, wait_for_start(&mut ws_rx, &sink)).await {
        Ok(true) => {}
        Ok(false) => {
            info!("socket closed before stream start");
            return;
        }
        // Speak anyway so the call is never silently stuck; frames are
        // dropped by the sink until the start event arrives.
        Err(_) => warn!("stream start not received within timeout, proceeding"),
    }

    let agent = AssessmentAgent::new(session, state.store.clone(), state.generator.clone());
    let hook = completion_hook(&state, session_id.clone());
    let pipeline = match VoicePipeline::new(
        session_id.clone(),
        agent,
        state.recognizer.clone(),
        state.synthesizer.clone(),
        sink.clone(),
        hook,
    ) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            error!(%error, "failed to build voice pipeline");
            return;
        }
    };

    let mut transcripts = pipeline.clone().start().await;

    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                let Some(Ok(message)) = inbound else { break };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                match serde_json::from_str::<TwilioEvent>(&text) {
                    // Covers a start event arriving after the bounded wait
                    // timed out.
                    Ok(TwilioEvent::Start { stream_sid, .. }) => {
                        sink.set_stream_sid(stream_sid).await;
                    }
                    Ok(TwilioEvent::Media { media }) => {
                        let payload = audio::decode_base64(&media.payload);
                        if !payload.is_empty() {
                            pipeline.ingest(Bytes::from(payload)).await;
                        }
                    }
                    Ok(TwilioEvent::Dtmf { dtmf }) => {
                        debug!(digit = %dtmf.digit, "keypress");
                        pipeline.clone().on_keypress(dtmf.digit);
                    }
                    Ok(TwilioEvent::Stop) => {
                        info!("stream stopped by telephone leg");
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => debug!(%error, "unrecognized media-stream message"),
                }
            }
            event = next_transcript(&mut transcripts) => {
                match event {
                    Some(event) => pipeline.clone().on_recognition(event),
                    None => {
                        debug!("transcript channel closed");
                        transcripts = None;
                    }
                }
            }
        }
    }

    pipeline.stop().await;
    info!("media stream closed");
}

/// Consumes inbound events until the `start` event arrives and the stream id
/// is known. Returns false if the socket closes first.
async fn wait_for_start(ws_rx: &mut SplitStream<WebSocket>, sink: &TwilioSink) -> bool {
    while let Some(Ok(message)) = ws_rx.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return false,
            _ => continue,
        };
        match serde_json::from_str::<TwilioEvent>(&text) {
            Ok(TwilioEvent::Start { stream_sid, start }) => {
                let call_sid = start.and_then(|meta| meta.call_sid);
                info!(stream_sid, call_sid = call_sid.as_deref().unwrap_or("-"), "stream started");
                sink.set_stream_sid(stream_sid).await;
                return true;
            }
            Ok(TwilioEvent::Stop) => return false,
            Ok(_) => {}
            Err(error) => debug!(%error, "unrecognized message before stream start"),
        }
    }
    false
}

/// Awaits the next transcript, or parks forever once the channel is gone so
/// the select loop keeps serving the socket.
async fn next_transcript(
    transcripts: &mut Option<mpsc::Receiver<RecognitionEvent>>,
) -> Option<RecognitionEvent> {
    match transcripts {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// Builds the hook that delivers the review-form SMS after the dialogue
/// completes. The status callback only sends the SMS for sessions the
/// dialogue never marked complete, so the two paths cannot double-send.
fn completion_hook(state: &AppState, session_id: String) -> CompletionHook {
    let store = state.store.clone();
    let telephony = state.telephony.clone();
    let config = state.config.clone();
    Box::new(move || {
        let store = store.clone();
        let telephony = telephony.clone();
        let config = config.clone();
        let session_id = session_id.clone();
        Box::pin(async move {
            let session = match store.get(&session_id).await {
                Ok(Some(session)) => session,
                Ok(None) => return,
                Err(error) => {
                    error!(session_id, %error, "completion hook lookup failed");
                    return;
                }
            };
            if !session.opted_in_for_sms {
                return;
            }
            let Some(cell) = session.cell_phone_for_sms.clone() else {
                return;
            };
            let body = form_sms_body(
                session.language,
                &session.first_name,
                &config.frontend_url,
                &session_id,
            );
            if let Err(error) = telephony.send_sms(&cell, &body).await {
                error!(session_id, %error, "failed to send form SMS");
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_parses() {
        let raw = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ123",
            "start": {"callSid": "CA456", "tracks": ["inbound"]}
        }"#;
        match serde_json::from_str::<TwilioEvent>(raw).unwrap() {
            TwilioEvent::Start { stream_sid, start } => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(start.unwrap().call_sid.as_deref(), Some("CA456"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn media_and_dtmf_events_parse() {
        let raw = r#"{"event": "media", "streamSid": "MZ123", "media": {"payload": "AAAA"}}"#;
        match serde_json::from_str::<TwilioEvent>(raw).unwrap() {
            TwilioEvent::Media { media } => assert_eq!(media.payload, "AAAA"),
            other => panic!("unexpected event: {other:?}"),
        }

        let raw = r#"{"event": "dtmf", "streamSid": "MZ123", "dtmf": {"track": "inbound_track", "digit": "5"}}"#;
        match serde_json::from_str::<TwilioEvent>(raw).unwrap() {
            TwilioEvent::Dtmf { dtmf } => assert_eq!(dtmf.digit, "5"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_events_do_not_fail() {
        let raw = r#"{"event": "mark", "streamSid": "MZ123"}"#;
        assert!(matches!(
            serde_json::from_str::<TwilioEvent>(raw).unwrap(),
            TwilioEvent::Unknown
        ));
        assert!(matches!(
            serde_json::from_str::<TwilioEvent>(r#"{"event": "stop"}"#).unwrap(),
            TwilioEvent::Stop
        ));
    }

    #[test]
    fn outbound_media_frames_are_transport_sized() {
        let mulaw = vec![0xFFu8; 400];
        let messages = media_messages("MZ123", &mulaw).unwrap();
        // 400 bytes split into 160 + 160 + 80.
        assert_eq!(messages.len(), 3);
        for message in &messages {
            let value: serde_json::Value = serde_json::from_str(message).unwrap();
            assert_eq!(value["event"], "media");
            assert_eq!(value["streamSid"], "MZ123");
            assert!(value["media"]["payload"].is_string());
        }
        let last: serde_json::Value = serde_json::from_str(&messages[2]).unwrap();
        let payload = last["media"]["payload"].as_str().unwrap();
        assert_eq!(audio::decode_base64(payload).len(), 80);
    }
}
