use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::session::flash::Flash;

/// Everything a browser's session carries between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct SessionData {
    /// Display name of the signed-in user.
    pub user_name: Option<String>,
    /// Email of the signed-in user; its presence means "logged in".
    pub user_email: Option<String>,
    /// Unix timestamp (seconds) of the last gated request.
    pub last_used: Option<i64>,
    /// Pending flash messages.
    pub flash: Flash,
}

/// The persisted form of a session: what the cookie carries.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SessionRecord {
    #[bincode(with_serde)]
    pub id: Uuid,
    pub data: SessionData,
}

/// Represents one browser's server-side state for the duration of a request.
///
/// Mutations go through methods that track whether the session needs to be
/// written back; a session nobody touched never produces a `Set-Cookie`.
#[derive(Debug, Clone)]
pub struct Session {
    id: Option<Uuid>,
    data: SessionData,
    is_new: bool,
    modified: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh, anonymous session with no cookie behind it.
    pub fn new() -> Self {
        Self {
            id: None,
            data: SessionData::default(),
            is_new: true,
            modified: false,
        }
    }

    /// A session restored from a decoded cookie.
    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            id: Some(record.id),
            data: record.data,
            is_new: false,
            modified: false,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Mutable access; marks the session as modified.
    pub fn data_mut(&mut self) -> &mut SessionData {
        self.modified = true;
        &mut self.data
    }

    /// Promotes the session to a logged-in identity.
    pub fn set_identity(&mut self, name: String, email: String, now: DateTime<Utc>) {
        let data = self.data_mut();
        data.user_name = Some(name);
        data.user_email = Some(email);
        data.last_used = Some(now.timestamp());
    }

    /// Slides the login window forward.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.data_mut().last_used = Some(now.timestamp());
    }

    /// Drops every value, flash included.
    pub fn clear(&mut self) {
        *self.data_mut() = SessionData::default();
    }

    pub fn add_flash(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.data_mut().flash.add(category, message);
    }

    /// Takes the pending flash messages. Only marks the session modified
    /// when there was something to take.
    pub fn pop_flash(&mut self) -> BTreeMap<String, Vec<String>> {
        if self.data.flash.is_empty() {
            return BTreeMap::new();
        }
        self.data_mut().flash.take()
    }

    /// Whether the session must be written back to the client.
    pub fn needs_save(&self) -> bool {
        self.modified
    }

    /// The record to persist, assigning an id on first save.
    pub(crate) fn to_record(&mut self) -> SessionRecord {
        let id = *self.id.get_or_insert_with(Uuid::new_v4);
        SessionRecord {
            id,
            data: self.data.clone(),
        }
    }

    pub(crate) fn mark_saved(&mut self) {
        self.is_new = false;
        self.modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_needs_no_save() {
        let mut session = Session::new();
        assert!(session.is_new());
        assert!(!session.needs_save());

        assert!(session.pop_flash().is_empty());
        assert!(!session.needs_save());
    }

    #[test]
    fn pop_flash_returns_messages_once() {
        let mut session = Session::new();
        session.add_flash("success", "User deleted");

        let first = session.pop_flash();
        assert_eq!(first["success"], vec!["User deleted".to_string()]);
        assert!(session.pop_flash().is_empty());
    }

    #[test]
    fn clear_drops_identity_and_flash() {
        let mut session = Session::new();
        session.set_identity("Joe".into(), "joe@example.com".into(), Utc::now());
        session.add_flash("info", "hi");

        session.clear();
        assert_eq!(session.data(), &SessionData::default());
        assert!(session.needs_save());
    }

    #[test]
    fn record_id_is_stable_across_saves() {
        let mut session = Session::new();
        let first = session.to_record().id;
        session.mark_saved();
        assert_eq!(session.to_record().id, first);
        assert_eq!(session.id(), Some(first));
        assert!(!session.is_new());
    }
}
