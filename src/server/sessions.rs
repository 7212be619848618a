//! Anonymous session tokens.
//!
//! Every device signs in anonymously once and receives a bearer token tied
//! to a fresh user ID. Tokens live in memory, so a server restart signs
//! everybody out; clients simply sign in again on their next start.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Data associated with a session token.
#[derive(Debug, Clone)]
pub struct Session {
    /// Anonymous user the token was issued to.
    pub user_id: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

/// In-memory session store with expiry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store whose sessions last `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Signs in a new anonymous user.
    ///
    /// Returns the bearer token and the session it maps to.
    pub fn issue(&self) -> (String, Session) {
        let token = generate_token();
        let now = Instant::now();
        let session = Session {
            user_id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), session.clone());

        (token, session)
    }

    /// Looks up a token. Returns `None` if it is unknown or expired.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(token)
            .filter(|session| Instant::now() <= session.expires_at)
            .cloned()
    }

    /// Removes all expired sessions.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    /// Returns the number of sessions currently stored.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 24 * 60 * 60)) // 30 days
    }
}

/// Generates a secure random token.
///
/// Returns 32 random bytes encoded as base64url (no padding).
fn generate_token() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_issue_returns_unique_tokens_and_users() {
        let store = SessionStore::default();

        let (token1, session1) = store.issue();
        let (token2, session2) = store.issue();

        assert_ne!(token1, token2);
        assert_ne!(session1.user_id, session2.user_id);
        assert_eq!(token1.len(), 43); // 32 bytes base64url = 43 chars
    }

    #[test]
    fn test_validate_issued_token() {
        let store = SessionStore::default();
        let (token, session) = store.issue();

        let found = store.validate(&token).unwrap();
        assert_eq!(found.user_id, session.user_id);

        // Tokens are reusable for the lifetime of the session.
        assert!(store.validate(&token).is_some());
    }

    #[test]
    fn test_validate_unknown_token() {
        let store = SessionStore::default();
        assert!(store.validate("nonexistent-token").is_none());
    }

    #[test]
    fn test_validate_expired_token() {
        let store = SessionStore::new(Duration::from_secs(0));
        let (token, _) = store.issue();

        thread::sleep(Duration::from_millis(10));

        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn test_cleanup_expired() {
        let store = SessionStore::new(Duration::from_secs(0));
        store.issue();
        store.issue();

        thread::sleep(Duration::from_millis(10));
        assert_eq!(store.len(), 2);

        assert_eq!(store.cleanup_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_generate_token_format() {
        let token = generate_token();

        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
