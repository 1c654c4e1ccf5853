//! Call Session Model
//!
//! The session record tracks everything collected during one assessment call:
//! caller identity, language preference, authentication evidence, the three
//! survey answers, and SMS opt-in. The record is owned by the session store;
//! the dialogue controller works on a read-through copy and pushes updates
//! back through the store contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The two languages the agent can conduct a call in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    /// Maps a recognizer language hint (e.g. "en-US", "es") onto a supported
    /// language. Hints for unsupported languages are ignored.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_ascii_lowercase();
        if hint.starts_with("es") {
            Some(Language::Spanish)
        } else if hint.starts_with("en") {
            Some(Language::English)
        } else {
            None
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "en"),
            Language::Spanish => write!(f, "es"),
        }
    }
}

/// Self-rated general health, from the first survey question.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthRating {
    Excellent,
    VeryGood,
    Good,
    Fair,
    Poor,
}

/// Degree of limitation, from the two activity questions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitationLevel {
    LimitedALot,
    LimitedALittle,
    NotLimited,
}

/// Identity evidence collected during the authentication step.
///
/// `authenticated` is derived: it is true iff at least two of the three
/// identity fields are present. It is recomputed on every update and never
/// assigned directly by callers.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AuthenticationData {
    pub date_of_birth: Option<String>,
    pub zip_code: Option<String>,
    pub last_four_ssn: Option<String>,
    pub authenticated: bool,
}

impl AuthenticationData {
    /// Number of identity fields currently held.
    pub fn provided_count(&self) -> usize {
        [&self.date_of_birth, &self.zip_code, &self.last_four_ssn]
            .into_iter()
            .filter(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count()
    }

    /// Re-derives `authenticated` from the 2-of-3 rule.
    pub fn recompute(&mut self) {
        self.authenticated = self.provided_count() >= 2;
    }
}

/// Identity fields produced by structured extraction from a caller utterance.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IdentityFields {
    pub dob: Option<String>,
    pub zip: Option<String>,
    pub ssn4: Option<String>,
}

impl IdentityFields {
    pub fn is_empty(&self) -> bool {
        let blank = |f: &Option<String>| f.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.dob) && blank(&self.zip) && blank(&self.ssn4)
    }
}

/// Answers to the three assessment questions.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AssessmentAnswers {
    pub general_health: Option<HealthRating>,
    pub moderate_activities_limitation: Option<LimitationLevel>,
    pub climbing_stairs_limitation: Option<LimitationLevel>,
}

/// One assessment call, as persisted in the session store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallSession {
    pub session_id: String,
    pub first_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub authentication: AuthenticationData,
    #[serde(default)]
    pub answers: AssessmentAnswers,
    #[serde(default)]
    pub cell_phone_for_sms: Option<String>,
    #[serde(default)]
    pub opted_in_for_sms: bool,
    #[serde(default)]
    pub call_completed: bool,
    #[serde(default)]
    pub form_submitted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(first_name: &str, phone_number: &str, language: Language) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            phone_number: phone_number.to_string(),
            language,
            authentication: AuthenticationData::default(),
            answers: AssessmentAnswers::default(),
            cell_phone_for_sms: None,
            opted_in_for_sms: false,
            call_completed: false,
            form_submitted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_hint_mapping() {
        assert_eq!(Language::from_hint("es"), Some(Language::Spanish));
        assert_eq!(Language::from_hint("es-419"), Some(Language::Spanish));
        assert_eq!(Language::from_hint("en-US"), Some(Language::English));
        assert_eq!(Language::from_hint("EN"), Some(Language::English));
        assert_eq!(Language::from_hint("fr"), None);
        assert_eq!(Language::from_hint(""), None);
    }

    #[test]
    fn language_serializes_as_short_code() {
        assert_eq!(serde_json::to_string(&Language::English).unwrap(), "\"en\"");
        assert_eq!(serde_json::to_string(&Language::Spanish).unwrap(), "\"es\"");
        let lang: Language = serde_json::from_str("\"es\"").unwrap();
        assert_eq!(lang, Language::Spanish);
    }

    #[test]
    fn authentication_requires_two_of_three() {
        let mut auth = AuthenticationData::default();
        auth.recompute();
        assert!(!auth.authenticated);

        auth.date_of_birth = Some("01/01/1980".into());
        auth.recompute();
        assert!(!auth.authenticated);

        auth.zip_code = Some("90210".into());
        auth.recompute();
        assert!(auth.authenticated);

        // Blank strings never count as evidence.
        auth.zip_code = Some("  ".into());
        auth.recompute();
        assert!(!auth.authenticated);
    }

    #[test]
    fn identity_fields_emptiness() {
        assert!(IdentityFields::default().is_empty());
        let partial = IdentityFields {
            zip: Some("90210".into()),
            ..Default::default()
        };
        assert!(!partial.is_empty());
        let blank = IdentityFields {
            dob: Some("".into()),
            ..Default::default()
        };
        assert!(blank.is_empty());
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = CallSession::new("Maria", "+15551234567", Language::Spanish);
        session.answers.general_health = Some(HealthRating::VeryGood);
        session.authentication.zip_code = Some("90210".into());

        let json = serde_json::to_string(&session).unwrap();
        let decoded: CallSession = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, session);
        assert!(json.contains("very_good"));
    }
}
