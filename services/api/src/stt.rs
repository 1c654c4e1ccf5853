//! Streaming Speech Recognition
//!
//! The recognizer contract hands back a write handle for caller audio and an
//! event channel for transcripts. The production implementation streams
//! mu-law telephone audio to Deepgram's live WebSocket API; frames are
//! forwarded exactly as they arrive from the telephone leg, with the
//! encoding declared in the connection parameters instead of transcoding.

use aldea_core::session::Language;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message},
};
use tracing::{debug, error, info, warn};

/// A transcript fragment from the recognizer.
#[derive(Debug, Clone)]
pub struct RecognitionEvent {
    pub text: String,
    /// Interim results are advisory; only final results drive the dialogue.
    pub is_final: bool,
    /// Language code reported by the recognizer for this result, if any.
    pub detected_language: Option<String>,
}

/// Write side of an open recognition stream.
#[async_trait]
pub trait RecognitionHandle: Send + Sync {
    /// Forwards one frame of caller audio.
    async fn send_audio(&self, frame: Bytes) -> Result<()>;

    /// Closes the stream. Safe to call more than once.
    async fn close(&self);
}

/// A streaming speech recognition provider.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Opens a recognition stream for one call. `language` is the session's
    /// current preference; with `detect_language` the recognizer identifies
    /// the spoken language itself and reports it on each result, enabling the
    /// mid-call switch. Returns the audio write handle and the channel
    /// transcript events arrive on; the channel closes when the provider
    /// connection ends.
    async fn open_stream(
        &self,
        language: Language,
        detect_language: bool,
    ) -> Result<(Arc<dyn RecognitionHandle>, mpsc::Receiver<RecognitionEvent>)>;
}

// Wire types for Deepgram's live transcription messages. Only the fields the
// service reads are modeled.

#[derive(Deserialize)]
struct DeepgramMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    channel: Option<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    #[serde(default)]
    transcript: String,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Idle gap after which a keep-alive is sent so Deepgram does not drop the
/// connection during long silences.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// [`SpeechRecognizer`] backed by Deepgram's live WebSocket API.
pub struct DeepgramRecognizer {
    api_key: String,
    base_url: String,
}

impl DeepgramRecognizer {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url }
    }

    fn stream_url(&self, language: Language, detect_language: bool) -> String {
        // Deepgram treats `language` and `detect_language` as mutually
        // exclusive; the fixed-language form is only used when detection is
        // off.
        let language_params = if detect_language {
            "detect_language=true".to_string()
        } else {
            let code = match language {
                Language::English => "en-US",
                Language::Spanish => "es",
            };
            format!("language={code}")
        };
        format!(
            "{}?model=nova-2&smart_format=true&punctuate=true&interim_results=true\
             &endpointing=300&vad_events=true&{}\
             &encoding=mulaw&sample_rate=8000&channels=1",
            self.base_url, language_params
        )
    }
}

struct DeepgramHandle {
    sink: Arc<Mutex<WsSink>>,
    closed: AtomicBool,
}

#[async_trait]
impl RecognitionHandle for DeepgramHandle {
    async fn send_audio(&self, frame: Bytes) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.sink
            .lock()
            .await
            .send(Message::Binary(frame))
            .await
            .context("failed to forward audio to recognizer")
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink
            .send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
            .await;
        let _ = sink.close().await;
    }
}

#[async_trait]
impl SpeechRecognizer for DeepgramRecognizer {
    async fn open_stream(
        &self,
        language: Language,
        detect_language: bool,
    ) -> Result<(Arc<dyn RecognitionHandle>, mpsc::Receiver<RecognitionEvent>)> {
        let mut request = self
            .stream_url(language, detect_language)
            .into_client_request()
            .context("invalid recognizer URL")?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Token {}", self.api_key))
                .context("invalid recognizer API key")?,
        );

        let (ws, _) = connect_async(request)
            .await
            .context("failed to connect to recognizer")?;
        info!("recognition stream opened");

        let (sink, mut stream) = ws.split();
        let sink = Arc::new(Mutex::new(sink));
        let handle = Arc::new(DeepgramHandle {
            sink: sink.clone(),
            closed: AtomicBool::new(false),
        });

        let (tx, rx) = mpsc::channel::<RecognitionEvent>(64);
        tokio::spawn(async move {
            loop {
                let message = match tokio::time::timeout(KEEPALIVE_INTERVAL, stream.next()).await {
                    Err(_) => {
                        let keepalive = Message::Text(r#"{"type":"KeepAlive"}"#.into());
                        if sink.lock().await.send(keepalive).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(Some(Ok(message))) => message,
                    Ok(Some(Err(error))) => {
                        error!(%error, "recognizer connection error");
                        break;
                    }
                    Ok(None) => break,
                };

                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let parsed: DeepgramMessage = match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(error) => {
                        debug!(%error, "unparseable recognizer message");
                        continue;
                    }
                };
                if parsed.kind != "Results" {
                    continue;
                }
                let Some(channel) = parsed.channel else {
                    continue;
                };
                let Some(alternative) = channel.alternatives.first() else {
                    continue;
                };
                let transcript = alternative.transcript.trim();
                if transcript.is_empty() {
                    continue;
                }
                let event = RecognitionEvent {
                    text: transcript.to_string(),
                    is_final: parsed.is_final,
                    detected_language: channel.detected_language.clone(),
                };
                if tx.send(event).await.is_err() {
                    // Receiver dropped, the call is over.
                    break;
                }
            }
            warn!("recognition stream ended");
        });

        Ok((handle, rx))
    }
}
