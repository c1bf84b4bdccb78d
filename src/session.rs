//! In-memory conversation sessions.

use crate::error::{Result, SyllabusError};
use crate::llm::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A single message in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Default)]
struct Inner {
    counter: u64,
    sessions: HashMap<String, Vec<SessionMessage>>,
}

/// Keeps the last few exchanges of each conversation.
pub struct SessionManager {
    max_history: usize,
    inner: Mutex<Inner>,
}

impl SessionManager {
    /// Create a manager keeping at most `max_history` exchanges per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }

    /// Start a new session and return its id.
    pub fn create_session(&self) -> Result<String> {
        let mut inner = self.lock()?;
        inner.counter += 1;
        let id = format!("session_{}", inner.counter);
        inner.sessions.insert(id.clone(), Vec::new());
        debug!("Created {}", id);
        Ok(id)
    }

    /// Append a message, creating the session if needed.
    pub fn add_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let messages = inner.sessions.entry(session_id.to_string()).or_default();
        messages.push(SessionMessage {
            role,
            content: content.to_string(),
        });

        let limit = self.max_history * 2;
        if messages.len() > limit {
            let excess = messages.len() - limit;
            messages.drain(..excess);
        }
        Ok(())
    }

    /// Record a question and its answer.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        self.add_message(session_id, Role::User, user)?;
        self.add_message(session_id, Role::Assistant, assistant)
    }

    /// Session history as `User: ...` / `Assistant: ...` lines, if any.
    pub fn conversation_history(&self, session_id: &str) -> Result<Option<String>> {
        let inner = self.lock()?;
        let Some(messages) = inner.sessions.get(session_id).filter(|m| !m.is_empty()) else {
            return Ok(None);
        };

        let lines: Vec<String> = messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, m.content)
            })
            .collect();
        Ok(Some(lines.join("\n")))
    }

    /// Forget a session's messages.
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(messages) = inner.sessions.get_mut(session_id) {
            messages.clear();
        }
        Ok(())
    }
}
