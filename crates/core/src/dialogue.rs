//! Dialogue Controller
//!
//! A finite-state controller for the scripted assessment call. State
//! transitions are driven entirely by the deterministic parsers in
//! [`crate::parse`]; the language model only phrases the next prompt and
//! performs structured identity extraction. An unrecognized utterance never
//! moves the state machine, it just re-asks the current question.

use crate::llm::TextGenerator;
use crate::parse;
use crate::session::{CallSession, IdentityFields, Language};
use crate::store::SessionStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns of history forwarded to the generator.
const HISTORY_WINDOW: usize = 20;

const RESPONSE_TEMPERATURE: f32 = 0.7;
const RESPONSE_MAX_TOKENS: u32 = 200;
const EXTRACTION_TEMPERATURE: f32 = 0.0;
const EXTRACTION_MAX_TOKENS: u32 = 100;

/// The stages of an assessment call, in call order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    Greeting,
    Authentication,
    IntroAssessment,
    QuestionGeneralHealth,
    QuestionModerateActivities,
    QuestionClimbingStairs,
    SmsOptIn,
    PhoneNumberCollection,
    Farewell,
    Completed,
}

impl DialogueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueState::Greeting => "greeting",
            DialogueState::Authentication => "authentication",
            DialogueState::IntroAssessment => "intro_assessment",
            DialogueState::QuestionGeneralHealth => "question_general_health",
            DialogueState::QuestionModerateActivities => "question_moderate_activities",
            DialogueState::QuestionClimbingStairs => "question_climbing_stairs",
            DialogueState::SmsOptIn => "sms_opt_in",
            DialogueState::PhoneNumberCollection => "phone_number_collection",
            DialogueState::Farewell => "farewell",
            DialogueState::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Agent,
}

/// One utterance in the conversation history.
#[derive(Debug, Clone)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn caller(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Caller,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
        }
    }
}

fn greeting_text(language: Language, first_name: &str) -> String {
    match language {
        Language::English => format!(
            "Hi {first_name}, this is Aldea calling from Zappix for your annual \
             health assessment. Please say continue to get started."
        ),
        Language::Spanish => format!(
            "Hola {first_name}, soy Aldea llamando de parte de Zappix para su \
             evaluación de salud anual. ¿Puede decir continuar para comenzar?"
        ),
    }
}

fn farewell_text(language: Language, first_name: &str, opted_in: bool) -> String {
    match (language, opted_in) {
        (Language::English, true) => format!(
            "Perfect. We'll text you a link to review and submit your answers. \
             Thank you for your time, {first_name}. Goodbye!"
        ),
        (Language::English, false) => format!(
            "Thank you for completing your health assessment, {first_name}. \
             Have a great day. Goodbye!"
        ),
        (Language::Spanish, true) => format!(
            "Perfecto. Le enviaremos un mensaje de texto con un enlace para \
             revisar y enviar sus respuestas. Gracias por su tiempo, \
             {first_name}. ¡Adiós!"
        ),
        (Language::Spanish, false) => format!(
            "Gracias por completar su evaluación de salud, {first_name}. Que \
             tenga un buen día. ¡Adiós!"
        ),
    }
}

/// Fixed fallback line spoken when a turn cannot be processed.
pub fn apology_text(language: Language) -> &'static str {
    match language {
        Language::English => "I'm sorry, I had a moment. Could you please repeat that?",
        Language::Spanish => "Lo siento, tuve un problema. ¿Podría repetir eso?",
    }
}

fn state_instruction(state: DialogueState, language: Language) -> &'static str {
    match (state, language) {
        (DialogueState::Authentication, Language::English) => {
            "Ask the caller to verify their identity with their date of birth, \
             ZIP code, or the last four digits of their Social Security number. \
             At least two of the three are required. Acknowledge anything \
             already provided and ask only for what is still missing. Keep it \
             to one or two short sentences."
        }
        (DialogueState::IntroAssessment, Language::English) => {
            "Thank the caller for verifying their identity and explain that \
             you will ask three short questions about their health. Ask them \
             to say continue when they are ready."
        }
        (DialogueState::QuestionGeneralHealth, Language::English) => {
            "Ask: in general, would you say your health is excellent, very \
             good, good, fair, or poor? Mention they can also press 1 through 5."
        }
        (DialogueState::QuestionModerateActivities, Language::English) => {
            "Ask whether their health limits them in moderate activities, such \
             as moving a table, pushing a vacuum cleaner, or bowling. The \
             options are limited a lot, limited a little, or not limited at \
             all. Mention they can also press 1, 2, or 3."
        }
        (DialogueState::QuestionClimbingStairs, Language::English) => {
            "Ask whether their health limits them in climbing several flights \
             of stairs. The options are limited a lot, limited a little, or \
             not limited at all. Mention they can also press 1, 2, or 3."
        }
        (DialogueState::SmsOptIn, Language::English) => {
            "Tell the caller that was the last question and ask whether they \
             would like a text message with a link to review and submit their \
             answers. Yes or no."
        }
        (DialogueState::PhoneNumberCollection, Language::English) => {
            "Ask the caller for the best mobile number to send the text to."
        }
        (DialogueState::Authentication, Language::Spanish) => {
            "Pida al llamante que verifique su identidad con su fecha de \
             nacimiento, su código postal, o los últimos cuatro dígitos de su \
             número de seguro social. Se requieren al menos dos de los tres. \
             Reconozca lo que ya proporcionó y pida solo lo que falta. Use una \
             o dos frases cortas."
        }
        (DialogueState::IntroAssessment, Language::Spanish) => {
            "Agradezca al llamante por verificar su identidad y explique que \
             le hará tres preguntas breves sobre su salud. Pídale que diga \
             continuar cuando esté listo."
        }
        (DialogueState::QuestionGeneralHealth, Language::Spanish) => {
            "Pregunte: en general, ¿diría que su salud es excelente, muy \
             buena, buena, regular, o mala? Mencione que también puede \
             presionar del 1 al 5."
        }
        (DialogueState::QuestionModerateActivities, Language::Spanish) => {
            "Pregunte si su salud lo limita en actividades moderadas, como \
             mover una mesa, pasar la aspiradora, o jugar boliche. Las \
             opciones son muy limitado, poco limitado, o sin limitación. \
             Mencione que también puede presionar 1, 2, o 3."
        }
        (DialogueState::QuestionClimbingStairs, Language::Spanish) => {
            "Pregunte si su salud lo limita al subir varios pisos de \
             escaleras. Las opciones son muy limitado, poco limitado, o sin \
             limitación. Mencione que también puede presionar 1, 2, o 3."
        }
        (DialogueState::SmsOptIn, Language::Spanish) => {
            "Diga al llamante que esa fue la última pregunta y pregunte si le \
             gustaría recibir un mensaje de texto con un enlace para revisar y \
             enviar sus respuestas. Sí o no."
        }
        (DialogueState::PhoneNumberCollection, Language::Spanish) => {
            "Pida al llamante el mejor número de celular para enviar el \
             mensaje de texto."
        }
        // Greeting, farewell, and the terminal state use fixed templates.
        (
            DialogueState::Greeting | DialogueState::Farewell | DialogueState::Completed,
            _,
        ) => "",
    }
}

fn persona_context(state: DialogueState, session: &CallSession, language: Language) -> String {
    let mut answers = Vec::new();
    if let Some(rating) = session.answers.general_health {
        answers.push(format!("general health: {rating:?}"));
    }
    if let Some(level) = session.answers.moderate_activities_limitation {
        answers.push(format!("moderate activities: {level:?}"));
    }
    if let Some(level) = session.answers.climbing_stairs_limitation {
        answers.push(format!("climbing stairs: {level:?}"));
    }
    let answers = if answers.is_empty() {
        "None collected yet".to_string()
    } else {
        answers.join("; ")
    };
    let persona = match language {
        Language::English => {
            "You are Aldea, a warm and professional automated agent calling on \
             behalf of Zappix to conduct an annual health assessment over the \
             phone. Speak naturally and briefly; your words are read aloud. \
             Never use lists, markdown, or emoji. Respond in English."
        }
        Language::Spanish => {
            "Eres Aldea, una agente automatizada cálida y profesional que \
             llama de parte de Zappix para realizar una evaluación de salud \
             anual por teléfono. Habla de forma natural y breve; tus palabras \
             se leen en voz alta. Nunca uses listas, markdown, ni emojis. \
             Responde en español."
        }
    };
    format!(
        "{persona}\n\nCaller first name: {}\nCall stage: {}\nIdentity verified: {}\nIdentity fields provided: {} of 3\nAnswers so far: {}",
        session.first_name,
        state.as_str(),
        session.authentication.authenticated,
        session.authentication.provided_count(),
        answers,
    )
}

fn extraction_prompt(input: &str) -> String {
    format!(
        "Extract identity fields from the caller utterance below. Respond with \
         only a JSON object with exactly these keys: \"dob\" (date of birth as \
         spoken, or null), \"zip\" (5-digit ZIP code, or null), \"ssn4\" (last \
         four digits of a Social Security number, or null). Use null for \
         anything not present. No prose, no code fences.\n\nUtterance: {input}"
    )
}

/// Strips a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// The per-call dialogue controller.
///
/// Owns the conversation state for one call: the current [`DialogueState`],
/// a read-through copy of the session record, and the utterance history. One
/// agent instance serves exactly one call and is driven by one task at a
/// time.
pub struct AssessmentAgent {
    state: DialogueState,
    session: CallSession,
    language: Language,
    history: Vec<Turn>,
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn TextGenerator>,
}

impl AssessmentAgent {
    pub fn new(
        session: CallSession,
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let language = session.language;
        Self {
            state: DialogueState::Greeting,
            session,
            language,
            history: Vec::new(),
            store,
            generator,
        }
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// The opening line of the call. Composed from a fixed template so the
    /// caller always hears the same greeting with no model latency.
    pub fn initial_greeting(&mut self) -> String {
        let greeting = greeting_text(self.language, &self.session.first_name);
        self.push_turn(Turn::agent(greeting.clone()));
        greeting
    }

    /// Processes one caller utterance (or keypress, already mapped to text)
    /// and returns the agent's spoken reply plus whether the call is now
    /// complete.
    pub async fn process_input(
        &mut self,
        input: &str,
        detected_language: Option<&str>,
    ) -> Result<(String, bool)> {
        if let Some(hint) = detected_language {
            self.apply_language_hint(hint).await?;
        }

        debug!(state = self.state.as_str(), input, "processing caller input");
        self.push_turn(Turn::caller(input));
        self.advance(input).await?;

        let reply = self.compose_response().await;
        self.push_turn(Turn::agent(reply.clone()));
        Ok((reply, self.state == DialogueState::Completed))
    }

    /// Switches the call language when the recognizer reports a different
    /// supported language, and persists the preference.
    async fn apply_language_hint(&mut self, hint: &str) -> Result<()> {
        let Some(language) = Language::from_hint(hint) else {
            return Ok(());
        };
        if language == self.language {
            return Ok(());
        }
        info!(from = %self.language, to = %language, "switching call language");
        self.language = language;
        self.session.language = language;
        self.session = self.store.save(self.session.clone()).await?;
        Ok(())
    }

    /// Applies one caller utterance to the state machine. Recognized input
    /// updates the session through the store and moves to the next stage;
    /// anything else leaves the state unchanged.
    async fn advance(&mut self, input: &str) -> Result<()> {
        let id = self.session.session_id.clone();
        match self.state {
            DialogueState::Greeting => {
                if parse::is_affirmative(input) {
                    self.state = DialogueState::Authentication;
                }
            }
            DialogueState::Authentication => {
                let fields = self.extract_identity_fields(input).await;
                if !fields.is_empty() {
                    if let Some(updated) = self.store.update_authentication(&id, &fields).await? {
                        self.session = updated;
                    }
                }
                if self.session.authentication.authenticated {
                    info!(session_id = %id, "caller authenticated");
                    self.state = DialogueState::IntroAssessment;
                }
            }
            DialogueState::IntroAssessment => {
                if parse::is_acknowledgement(input) {
                    self.state = DialogueState::QuestionGeneralHealth;
                }
            }
            DialogueState::QuestionGeneralHealth => {
                if let Some(rating) = parse::parse_health_rating(input) {
                    if let Some(updated) = self
                        .store
                        .update_answers(&id, Some(rating), None, None)
                        .await?
                    {
                        self.session = updated;
                    }
                    self.state = DialogueState::QuestionModerateActivities;
                }
            }
            DialogueState::QuestionModerateActivities => {
                if let Some(level) = parse::parse_limitation(input) {
                    if let Some(updated) = self
                        .store
                        .update_answers(&id, None, Some(level), None)
                        .await?
                    {
                        self.session = updated;
                    }
                    self.state = DialogueState::QuestionClimbingStairs;
                }
            }
            DialogueState::QuestionClimbingStairs => {
                if let Some(level) = parse::parse_limitation(input) {
                    if let Some(updated) = self
                        .store
                        .update_answers(&id, None, None, Some(level))
                        .await?
                    {
                        self.session = updated;
                    }
                    self.state = DialogueState::SmsOptIn;
                }
            }
            DialogueState::SmsOptIn => {
                if parse::is_opt_in(input) {
                    self.state = DialogueState::PhoneNumberCollection;
                }
            }
            DialogueState::PhoneNumberCollection => {
                if let Some(phone) = parse::extract_phone_digits(input) {
                    if let Some(updated) = self.store.set_sms_opt_in(&id, &phone).await? {
                        self.session = updated;
                    }
                    self.state = DialogueState::Farewell;
                    self.complete_call().await?;
                }
            }
            // Farewell is a pass-through stage, left in the same turn that
            // entered it.
            DialogueState::Farewell => self.complete_call().await?,
            DialogueState::Completed => {}
        }
        Ok(())
    }

    async fn complete_call(&mut self) -> Result<()> {
        self.state = DialogueState::Completed;
        if let Some(updated) = self
            .store
            .mark_call_completed(&self.session.session_id)
            .await?
        {
            self.session = updated;
        }
        info!(session_id = %self.session.session_id, "call completed");
        Ok(())
    }

    /// Phrases the prompt for the current stage. Greeting and farewell come
    /// from fixed templates; everything else goes through the generator, with
    /// a fixed apology substituted when generation fails so the call never
    /// goes silent.
    async fn compose_response(&mut self) -> String {
        match self.state {
            DialogueState::Greeting => greeting_text(self.language, &self.session.first_name),
            DialogueState::Farewell | DialogueState::Completed => farewell_text(
                self.language,
                &self.session.first_name,
                self.session.opted_in_for_sms,
            ),
            state => {
                let context = persona_context(state, &self.session, self.language);
                let instruction = state_instruction(state, self.language);
                match self
                    .generator
                    .complete(
                        &context,
                        instruction,
                        &self.history,
                        RESPONSE_TEMPERATURE,
                        RESPONSE_MAX_TOKENS,
                    )
                    .await
                {
                    Ok(reply) => reply,
                    Err(error) => {
                        warn!(%error, state = state.as_str(), "response generation failed");
                        apology_text(self.language).to_string()
                    }
                }
            }
        }
    }

    /// Structured extraction of identity fields from a caller utterance.
    /// Extraction failures are treated as "nothing extracted": the caller is
    /// asked again rather than shown an error.
    async fn extract_identity_fields(&self, input: &str) -> IdentityFields {
        let prompt = extraction_prompt(input);
        let raw = match self
            .generator
            .complete("", &prompt, &[], EXTRACTION_TEMPERATURE, EXTRACTION_MAX_TOKENS)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "identity extraction failed");
                return IdentityFields::default();
            }
        };
        match serde_json::from_str::<IdentityFields>(strip_code_fence(&raw)) {
            Ok(fields) => fields,
            Err(error) => {
                warn!(%error, "identity extraction returned unparseable JSON");
                IdentityFields::default()
            }
        }
    }

    fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
        if self.history.len() > HISTORY_WINDOW {
            let excess = self.history.len() - HISTORY_WINDOW;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationError;
    use crate::session::{HealthRating, LimitationLevel};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Generator stand-in: answers extraction prompts with canned JSON and
    /// everything else with a fixed phrase.
    struct ScriptedGenerator;

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(
            &self,
            system: &str,
            instruction: &str,
            history: &[Turn],
            _temperature: f32,
            _max_output_tokens: u32,
        ) -> Result<String, GenerationError> {
            if system.is_empty() && history.is_empty() {
                let dob = instruction.contains("01/01/1980");
                let zip = instruction.contains("90210");
                let ssn = instruction.contains("6789");
                return Ok(format!(
                    "{{\"dob\": {}, \"zip\": {}, \"ssn4\": {}}}",
                    if dob { "\"01/01/1980\"" } else { "null" },
                    if zip { "\"90210\"" } else { "null" },
                    if ssn { "\"6789\"" } else { "null" },
                ));
            }
            Ok("Scripted reply.".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn complete(
            &self,
            _system: &str,
            _instruction: &str,
            _history: &[Turn],
            _temperature: f32,
            _max_output_tokens: u32,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Provider("down".to_string()))
        }
    }

    async fn new_agent(
        generator: Arc<dyn TextGenerator>,
    ) -> (AssessmentAgent, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = store
            .create("Maria", "+15550001111", Language::English)
            .await
            .unwrap();
        (
            AssessmentAgent::new(session, store.clone(), generator),
            store,
        )
    }

    #[tokio::test]
    async fn greeting_is_deterministic_and_recorded() {
        let (mut agent, _store) = new_agent(Arc::new(ScriptedGenerator)).await;
        let greeting = agent.initial_greeting();
        assert!(greeting.contains("Maria"));
        assert!(greeting.contains("continue"));
        assert_eq!(agent.state(), DialogueState::Greeting);
    }

    #[tokio::test]
    async fn unrecognized_input_never_advances() {
        let (mut agent, _store) = new_agent(Arc::new(ScriptedGenerator)).await;
        agent.initial_greeting();

        let (reply, done) = agent
            .process_input("what is this about", None)
            .await
            .unwrap();
        assert_eq!(agent.state(), DialogueState::Greeting);
        assert!(!done);
        // Still in the greeting stage, so the caller hears the template again.
        assert!(reply.contains("continue"));
    }

    #[tokio::test]
    async fn authentication_requires_two_fields_across_turns() {
        let (mut agent, _store) = new_agent(Arc::new(ScriptedGenerator)).await;
        agent.initial_greeting();
        agent.process_input("continue", None).await.unwrap();
        assert_eq!(agent.state(), DialogueState::Authentication);

        agent.process_input("01/01/1980", None).await.unwrap();
        assert_eq!(agent.state(), DialogueState::Authentication);

        // The same field again is not a second piece of evidence.
        agent.process_input("01/01/1980", None).await.unwrap();
        assert_eq!(agent.state(), DialogueState::Authentication);

        agent.process_input("90210", None).await.unwrap();
        assert_eq!(agent.state(), DialogueState::IntroAssessment);
        assert!(agent.session().authentication.authenticated);
    }

    #[tokio::test]
    async fn full_call_with_sms_opt_in() {
        let (mut agent, store) = new_agent(Arc::new(ScriptedGenerator)).await;
        agent.initial_greeting();

        let script = [
            "continue",
            "01/01/1980",
            "90210",
            "continue",
            "1",
            "3",
            "2",
            "yes",
            "5551234567",
        ];
        let mut done = false;
        for input in script {
            (_, done) = agent.process_input(input, None).await.unwrap();
        }

        assert!(done);
        assert_eq!(agent.state(), DialogueState::Completed);

        let session = store
            .get(&agent.session().session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(session.authentication.authenticated);
        assert_eq!(session.answers.general_health, Some(HealthRating::Excellent));
        assert_eq!(
            session.answers.moderate_activities_limitation,
            Some(LimitationLevel::NotLimited)
        );
        assert_eq!(
            session.answers.climbing_stairs_limitation,
            Some(LimitationLevel::LimitedALittle)
        );
        assert!(session.opted_in_for_sms);
        assert_eq!(session.cell_phone_for_sms.as_deref(), Some("5551234567"));
        assert!(session.call_completed);
    }

    #[tokio::test]
    async fn sms_opt_in_reasks_until_affirmative() {
        let (mut agent, store) = new_agent(Arc::new(ScriptedGenerator)).await;
        agent.initial_greeting();

        for input in ["continue", "01/01/1980", "90210", "continue", "2", "1", "3"] {
            agent.process_input(input, None).await.unwrap();
        }
        assert_eq!(agent.state(), DialogueState::SmsOptIn);

        // Neither noise nor a decline moves the state or ends the call; the
        // caller is asked again.
        for input in ["hmm", "no thanks"] {
            let (_, done) = agent.process_input(input, None).await.unwrap();
            assert!(!done);
            assert_eq!(agent.state(), DialogueState::SmsOptIn);
        }

        let session = store
            .get(&agent.session().session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!session.call_completed);
        assert!(!session.opted_in_for_sms);
        assert!(session.cell_phone_for_sms.is_none());

        let (_, done) = agent.process_input("yes", None).await.unwrap();
        assert!(!done);
        assert_eq!(agent.state(), DialogueState::PhoneNumberCollection);
    }

    #[tokio::test]
    async fn language_hint_switches_and_persists() {
        let (mut agent, store) = new_agent(Arc::new(ScriptedGenerator)).await;
        agent.initial_greeting();

        agent.process_input("continuar", Some("es")).await.unwrap();
        assert_eq!(agent.language(), Language::Spanish);
        let session = store
            .get(&agent.session().session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.language, Language::Spanish);

        // A hint for an unsupported language is ignored.
        agent.process_input("continue", Some("fr")).await.unwrap();
        assert_eq!(agent.language(), Language::Spanish);
    }

    #[tokio::test]
    async fn generation_failure_yields_apology() {
        let (mut agent, _store) = new_agent(Arc::new(FailingGenerator)).await;
        agent.initial_greeting();

        // "continue" advances past the greeting; the authentication prompt
        // then fails to generate and the caller hears the fixed apology.
        let (reply, done) = agent.process_input("continue", None).await.unwrap();
        assert_eq!(agent.state(), DialogueState::Authentication);
        assert!(!done);
        assert_eq!(reply, apology_text(Language::English));
    }

    #[test]
    fn code_fence_stripping() {
        assert_eq!(strip_code_fence("{\"dob\": null}"), "{\"dob\": null}");
        assert_eq!(
            strip_code_fence("```json\n{\"zip\": \"90210\"}\n```"),
            "{\"zip\": \"90210\"}"
        );
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }
}
