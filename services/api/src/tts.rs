//! Speech Synthesis
//!
//! The synthesizer contract offers a buffered call and a streaming call; the
//! orchestrator prefers streaming so the caller starts hearing audio before
//! the whole utterance is rendered, and falls back to the buffered call when
//! the stream cannot be opened. The production implementation uses
//! Cartesia's TTS API, requesting raw 16-bit PCM at 24 kHz.

use aldea_core::session::Language;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A text-to-speech provider producing PCM16 mono at 24 kHz.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders the whole utterance into one buffer.
    async fn synthesize(&self, text: &str, language: Language) -> Result<Bytes>;

    /// Renders the utterance as a stream of PCM chunks. The channel closes
    /// when synthesis finishes; an error item ends the stream early.
    async fn synthesize_stream(
        &self,
        text: &str,
        language: Language,
    ) -> Result<mpsc::Receiver<Result<Bytes>>>;
}

const CARTESIA_VERSION: &str = "2025-04-16";

// Request and SSE wire types for the Cartesia TTS API.

#[derive(Serialize)]
struct TtsRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: TtsVoice<'a>,
    output_format: TtsOutputFormat<'a>,
    language: &'a str,
}

#[derive(Serialize)]
struct TtsVoice<'a> {
    mode: &'a str,
    id: &'a str,
}

#[derive(Serialize)]
struct TtsOutputFormat<'a> {
    container: &'a str,
    encoding: &'a str,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct TtsSseEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`SpeechSynthesizer`] backed by the Cartesia TTS API.
pub struct CartesiaSynthesizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    voice_id: String,
    voice_id_spanish: String,
}

impl CartesiaSynthesizer {
    pub fn new(
        api_key: String,
        base_url: String,
        voice_id: String,
        voice_id_spanish: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            voice_id,
            voice_id_spanish,
        }
    }

    fn request_body<'a>(&'a self, text: &'a str, language: Language) -> TtsRequest<'a> {
        let (model_id, voice_id) = match language {
            Language::English => ("sonic-english", self.voice_id.as_str()),
            Language::Spanish => ("sonic-multilingual", self.voice_id_spanish.as_str()),
        };
        TtsRequest {
            model_id,
            transcript: text,
            voice: TtsVoice {
                mode: "id",
                id: voice_id,
            },
            output_format: TtsOutputFormat {
                container: "raw",
                encoding: "pcm_s16le",
                sample_rate: 24_000,
            },
            language: match language {
                Language::English => "en",
                Language::Spanish => "es",
            },
        }
    }

    fn post(&self, path: &str, text: &str, language: Language) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", CARTESIA_VERSION)
            .json(&self.request_body(text, language))
    }
}

#[async_trait]
impl SpeechSynthesizer for CartesiaSynthesizer {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Bytes> {
        let response = self
            .post("/tts/bytes", text, language)
            .send()
            .await
            .context("synthesis request failed")?
            .error_for_status()
            .context("synthesis request rejected")?;
        Ok(response.bytes().await?)
    }

    async fn synthesize_stream(
        &self,
        text: &str,
        language: Language,
    ) -> Result<mpsc::Receiver<Result<Bytes>>> {
        let response = self
            .post("/tts/sse", text, language)
            .send()
            .await
            .context("streaming synthesis request failed")?
            .error_for_status()
            .context("streaming synthesis request rejected")?;

        let (tx, rx) = mpsc::channel::<Result<Bytes>>(32);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            'read: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        let _ = tx.send(Err(error.into())).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(boundary) = buffer.find("\n\n") {
                    let event: String = buffer.drain(..boundary + 2).collect();
                    for chunk in parse_sse_event(&event) {
                        match chunk {
                            SseChunk::Audio(bytes) => {
                                if tx.send(Ok(bytes)).await.is_err() {
                                    return;
                                }
                            }
                            SseChunk::Done => break 'read,
                            SseChunk::Error(message) => {
                                let _ = tx.send(Err(anyhow!(message))).await;
                                return;
                            }
                        }
                    }
                }
            }
            debug!("synthesis stream finished");
        });

        Ok(rx)
    }
}

enum SseChunk {
    Audio(Bytes),
    Done,
    Error(String),
}

/// Parses one server-sent event block into audio chunks.
fn parse_sse_event(event: &str) -> Vec<SseChunk> {
    let mut chunks = Vec::new();
    for line in event.lines() {
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            continue;
        };
        let parsed: TtsSseEvent = match serde_json::from_str(data) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(%error, "unparseable synthesis event");
                continue;
            }
        };
        match parsed.kind.as_str() {
            "chunk" => {
                if let Some(payload) = parsed.data {
                    let bytes = crate::audio::decode_base64(&payload);
                    if !bytes.is_empty() {
                        chunks.push(SseChunk::Audio(Bytes::from(bytes)));
                    }
                }
            }
            "done" => chunks.push(SseChunk::Done),
            "error" => chunks.push(SseChunk::Error(
                parsed.error.unwrap_or_else(|| "synthesis error".to_string()),
            )),
            _ => {}
        }
    }
    chunks
}
