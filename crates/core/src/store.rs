//! Session Store Contract
//!
//! The store owns session lifetime (creation and expiry); the dialogue core
//! only reads, mutates a local copy, and saves. The contract is `get`/`save`
//! plus convenience mutators expressed as read-modify-write over those two
//! operations, so any backend that can fetch and persist a JSON record can
//! serve as a store. The service selects a backend once at startup.

use crate::session::{CallSession, HealthRating, IdentityFields, Language, LimitationLevel};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistent storage for [`CallSession`] records, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches a session, or `None` if it does not exist (or has expired).
    async fn get(&self, session_id: &str) -> Result<Option<CallSession>>;

    /// Persists a session, refreshing its `updated_at` timestamp. Returns the
    /// record as stored.
    async fn save(&self, session: CallSession) -> Result<CallSession>;

    /// Creates and persists a fresh session.
    async fn create(
        &self,
        first_name: &str,
        phone_number: &str,
        language: Language,
    ) -> Result<CallSession> {
        self.save(CallSession::new(first_name, phone_number, language))
            .await
    }

    /// Merges newly extracted identity fields into the session and re-derives
    /// the `authenticated` flag. Fields that were not extracted are left
    /// untouched, so re-providing a field the session already holds can never
    /// double count.
    async fn update_authentication(
        &self,
        session_id: &str,
        fields: &IdentityFields,
    ) -> Result<Option<CallSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        let present = |f: &Option<String>| f.as_deref().is_some_and(|v| !v.trim().is_empty());
        if present(&fields.dob) {
            session.authentication.date_of_birth = fields.dob.clone();
        }
        if present(&fields.zip) {
            session.authentication.zip_code = fields.zip.clone();
        }
        if present(&fields.ssn4) {
            session.authentication.last_four_ssn = fields.ssn4.clone();
        }
        session.authentication.recompute();
        Ok(Some(self.save(session).await?))
    }

    /// Records any subset of the three assessment answers.
    async fn update_answers(
        &self,
        session_id: &str,
        general_health: Option<HealthRating>,
        moderate_activities: Option<LimitationLevel>,
        climbing_stairs: Option<LimitationLevel>,
    ) -> Result<Option<CallSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        if let Some(rating) = general_health {
            session.answers.general_health = Some(rating);
        }
        if let Some(level) = moderate_activities {
            session.answers.moderate_activities_limitation = Some(level);
        }
        if let Some(level) = climbing_stairs {
            session.answers.climbing_stairs_limitation = Some(level);
        }
        Ok(Some(self.save(session).await?))
    }

    /// Records SMS opt-in together with the cell number to text.
    async fn set_sms_opt_in(
        &self,
        session_id: &str,
        cell_phone: &str,
    ) -> Result<Option<CallSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        session.opted_in_for_sms = true;
        session.cell_phone_for_sms = Some(cell_phone.to_string());
        Ok(Some(self.save(session).await?))
    }

    async fn mark_call_completed(&self, session_id: &str) -> Result<Option<CallSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        session.call_completed = true;
        Ok(Some(self.save(session).await?))
    }

    async fn mark_form_submitted(&self, session_id: &str) -> Result<Option<CallSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        session.form_submitted = true;
        Ok(Some(self.save(session).await?))
    }
}

/// In-memory session store.
///
/// The fallback backend when the primary store is unreachable at startup, and
/// the backend used throughout the test suites. Records live for the process
/// lifetime; expiry is the primary store's concern.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<CallSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, mut session: CallSession) -> Result<CallSession> {
        session.updated_at = Utc::now();
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }
}
