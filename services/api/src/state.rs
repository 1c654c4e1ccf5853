//! Shared Application State

use crate::config::Config;
use crate::stt::SpeechRecognizer;
use crate::telephony::TwilioClient;
use crate::tts::SpeechSynthesizer;
use aldea_core::llm::TextGenerator;
use aldea_core::store::SessionStore;
use std::sync::Arc;

/// Shared, read-only application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub generator: Arc<dyn TextGenerator>,
    pub telephony: Arc<TwilioClient>,
    pub config: Arc<Config>,
}
