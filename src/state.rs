use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::db::DbPool;
use crate::models::CurrentUser;

/// A signed-in browser session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    /// Token every state-changing request of this session must echo back.
    pub xsrf_token: String,
}

impl Session {
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user_id,
            email: self.email.clone(),
            xsrf_token: self.xsrf_token.clone(),
        }
    }
}

/// Server-side session store keyed by the random token in the session cookie.
#[derive(Clone, Default)]
pub struct SessionStore(Arc<Mutex<HashMap<String, Session>>>);

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
    }

    pub fn insert(&self, token: String, session: Session) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, session);
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    /// Shared client for the payment processor.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            sessions: SessionStore::new(),
            http: reqwest::Client::new(),
        }
    }
}
