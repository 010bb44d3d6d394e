use storage::Storage;
use tracing::info;

use crate::error::SessionError;

pub const SESSION_KEY: &str = "kanban_user";

/// The logged-in username, kept under its own key next to the board.
#[derive(Clone)]
pub struct Session {
    store: Storage,
}

impl Session {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }

    pub async fn login(&self, username: &str) -> Result<String, SessionError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::BlankUsername);
        }
        self.store.put_value(SESSION_KEY, username).await?;
        info!(username, "logged in");
        Ok(username.to_string())
    }

    pub async fn current_user(&self) -> Result<Option<String>, SessionError> {
        Ok(self.store.get_value(SESSION_KEY).await?)
    }

    /// Returns whether anyone was logged in.
    pub async fn logout(&self) -> Result<bool, SessionError> {
        let was_logged_in = self.store.remove_value(SESSION_KEY).await?;
        if was_logged_in {
            info!("logged out");
        }
        Ok(was_logged_in)
    }
}
