//! Duplex Voice Pipeline
//!
//! The orchestrator for one call: caller audio flows in through [`VoicePipeline::ingest`],
//! transcripts come back on the recognition channel, and agent replies are
//! synthesized, downsampled to telephone rate, and pushed out through the
//! transport sink. The pipeline is half-duplex: while the agent is speaking
//! (or thinking), inbound audio and transcripts are dropped, so the agent
//! never talks over itself or transcribes its own voice.

use crate::audio::{
    self, StreamResampler, SYNTHESIS_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE,
};
use crate::stt::{RecognitionEvent, RecognitionHandle, SpeechRecognizer};
use crate::tts::SpeechSynthesizer;
use aldea_core::dialogue::{AssessmentAgent, apology_text};
use aldea_core::session::Language;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// Outbound half of the telephone leg.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Sends mu-law audio to the caller.
    async fn send_audio(&self, mulaw: &[u8]) -> Result<()>;

    /// Discards any audio the transport has buffered but not yet played.
    async fn clear(&self) -> Result<()>;
}

/// Runs once when the dialogue reaches completion, before the call tears
/// down. Used to deliver the post-call SMS.
pub type CompletionHook = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Samples fed to the resampler per processing chunk (20 ms at 24 kHz).
const RESAMPLER_CHUNK: usize = 480;

/// Pause between the farewell finishing and the stream tearing down, so the
/// tail of the audio reaches the caller.
const FAREWELL_GRACE: Duration = Duration::from_secs(1);

pub struct VoicePipeline {
    session_id: String,
    agent: Mutex<AssessmentAgent>,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn TransportSink>,
    stt: Mutex<Option<Arc<dyn RecognitionHandle>>>,
    resampler: Mutex<StreamResampler>,
    running: AtomicBool,
    speaking: AtomicBool,
    /// Set by interim recognition results; not acted on beyond observability.
    speech_detected: AtomicBool,
    on_complete: Mutex<Option<CompletionHook>>,
}

impl VoicePipeline {
    pub fn new(
        session_id: String,
        agent: AssessmentAgent,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn TransportSink>,
        on_complete: CompletionHook,
    ) -> Result<Arc<Self>> {
        let resampler =
            StreamResampler::new(SYNTHESIS_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE, RESAMPLER_CHUNK)?;
        Ok(Arc::new(Self {
            session_id,
            agent: Mutex::new(agent),
            recognizer,
            synthesizer,
            sink,
            stt: Mutex::new(None),
            resampler: Mutex::new(resampler),
            running: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            speech_detected: AtomicBool::new(false),
            on_complete: Mutex::new(Some(on_complete)),
        }))
    }

    /// Starts the pipeline: opens the recognition stream and speaks the
    /// greeting. Returns the transcript channel, or `None` when the
    /// recognizer is unavailable; the call then continues in degraded mode,
    /// driven by keypad input only.
    ///
    /// The greeting plays on its own task, like any later turn, so the caller
    /// of `start` is already consuming the socket while it plays and inbound
    /// frames arriving during the greeting are dropped rather than queued.
    pub async fn start(self: Arc<Self>) -> Option<mpsc::Receiver<RecognitionEvent>> {
        self.running.store(true, Ordering::SeqCst);

        let language = self.agent.lock().await.language();
        let events = match self.recognizer.open_stream(language, true).await {
            Ok((handle, events)) => {
                *self.stt.lock().await = Some(handle);
                Some(events)
            }
            Err(error) => {
                warn!(session_id = %self.session_id, %error,
                      "recognizer unavailable, continuing with keypad input only");
                None
            }
        };

        let (greeting, language) = {
            let mut agent = self.agent.lock().await;
            (agent.initial_greeting(), agent.language())
        };
        self.speaking.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            self.speak(&greeting, language).await;
            self.speaking.store(false, Ordering::SeqCst);
        });

        events
    }

    /// Forwards one frame of caller audio to the recognizer. Frames are
    /// dropped while the pipeline is stopped or the agent holds the floor.
    pub async fn ingest(&self, frame: Bytes) {
        if !self.running.load(Ordering::SeqCst) || self.speaking.load(Ordering::SeqCst) {
            return;
        }
        let handle = self.stt.lock().await.clone();
        if let Some(handle) = handle {
            if let Err(error) = handle.send_audio(frame).await {
                debug!(%error, "dropping frame, recognizer write failed");
            }
        }
    }

    /// Reacts to a transcript event. Interim results only mark that the
    /// caller is speaking; final, non-empty transcripts start a turn.
    pub fn on_recognition(self: Arc<Self>, event: RecognitionEvent) {
        if !event.is_final {
            self.speech_detected.store(true, Ordering::SeqCst);
            return;
        }
        let text = event.text.trim().to_string();
        if text.is_empty() {
            return;
        }
        tokio::spawn(async move {
            self.process_turn(text, event.detected_language).await;
        });
    }

    /// Reacts to a DTMF keypress, treated as an alternate utterance.
    pub fn on_keypress(self: Arc<Self>, digit: String) {
        tokio::spawn(async move {
            self.process_turn(digit, None).await;
        });
    }

    /// Runs one dialogue turn. The speaking flag is claimed before the agent
    /// starts thinking, so audio arriving during generation is dropped too.
    async fn process_turn(&self, input: String, language_hint: Option<String>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.speaking.swap(true, Ordering::SeqCst) {
            debug!(session_id = %self.session_id, "turn dropped, agent holds the floor");
            return;
        }

        let (result, language) = {
            let mut agent = self.agent.lock().await;
            let result = agent.process_input(&input, language_hint.as_deref()).await;
            (result, agent.language())
        };

        match result {
            Ok((reply, completed)) => {
                self.speak(&reply, language).await;
                self.speaking.store(false, Ordering::SeqCst);
                if completed {
                    info!(session_id = %self.session_id, "dialogue complete, closing call");
                    tokio::time::sleep(FAREWELL_GRACE).await;
                    self.stop().await;
                }
            }
            Err(error) => {
                error!(session_id = %self.session_id, %error, "turn processing failed");
                self.speak(apology_text(language), language).await;
                self.speaking.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Synthesizes and relays one reply, sentence by sentence so the first
    /// audio reaches the caller while later sentences are still rendering.
    async fn speak(&self, text: &str, language: Language) {
        for segment in split_sentences(text) {
            self.speak_segment(&segment, language).await;
        }
        let tail = self.resampler.lock().await.flush();
        match tail {
            Ok(samples) if !samples.is_empty() => {
                let mulaw = audio::f32_to_mulaw(&samples);
                if let Err(error) = self.sink.send_audio(&mulaw).await {
                    debug!(%error, "failed to send resampler tail");
                }
            }
            Ok(_) => {}
            Err(error) => warn!(%error, "resampler flush failed"),
        }
    }

    /// Streams one segment, retrying once through the buffered endpoint when
    /// the stream cannot be opened or fails partway. If that also fails the
    /// segment is skipped.
    async fn speak_segment(&self, segment: &str, language: Language) {
        match self.synthesizer.synthesize_stream(segment, language).await {
            Ok(mut chunks) => {
                while let Some(chunk) = chunks.recv().await {
                    match chunk {
                        Ok(pcm) => self.relay_chunk(&pcm).await,
                        Err(error) => {
                            warn!(%error, "synthesis stream failed mid-utterance");
                            self.speak_segment_buffered(segment, language).await;
                            return;
                        }
                    }
                }
            }
            Err(error) => {
                warn!(%error, "streaming synthesis unavailable, using buffered synthesis");
                self.speak_segment_buffered(segment, language).await;
            }
        }
    }

    async fn speak_segment_buffered(&self, segment: &str, language: Language) {
        match self.synthesizer.synthesize(segment, language).await {
            Ok(pcm) => self.relay_chunk(&pcm).await,
            Err(error) => error!(%error, "synthesis failed, segment skipped"),
        }
    }

    /// Downsamples one PCM16 chunk to telephone rate and sends it.
    async fn relay_chunk(&self, pcm: &[u8]) {
        let samples = audio::pcm16_bytes_to_f32(pcm);
        if samples.is_empty() {
            return;
        }
        let resampled = match self.resampler.lock().await.process(&samples) {
            Ok(resampled) => resampled,
            Err(error) => {
                warn!(%error, "resampling failed, chunk dropped");
                return;
            }
        };
        if resampled.is_empty() {
            return;
        }
        let mulaw = audio::f32_to_mulaw(&resampled);
        if let Err(error) = self.sink.send_audio(&mulaw).await {
            debug!(%error, "transport write failed");
        }
    }

    /// Tears the pipeline down: closes the recognition stream, clears any
    /// buffered outbound audio, and fires the completion hook. Idempotent;
    /// only the first caller performs the teardown.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.stt.lock().await.take() {
            handle.close().await;
        }
        if let Err(error) = self.sink.clear().await {
            debug!(%error, "transport clear failed during stop");
        }
        if let Some(hook) = self.on_complete.lock().await.take() {
            hook().await;
        }
        info!(session_id = %self.session_id, "voice pipeline stopped");
    }

    #[cfg(test)]
    fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }
}

/// Splits a reply into sentence-sized synthesis segments. Segments without
/// any alphanumeric content (stray punctuation) are dropped.
fn split_sentences(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            push_segment(&mut segments, &mut current);
        }
    }
    push_segment(&mut segments, &mut current);
    segments
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        segments.push(trimmed.to_string());
    }
    current.clear();
}
