//! In-process store backed by hash maps.
//!
//! Used when no `REDIS_URL` is configured and by the test suites. Every
//! operation takes the table lock once, so uniqueness checks and inserts are
//! atomic with respect to each other.

use super::{Store, StoreError};
use crate::models::{Application, StoredDeveloper, StoredSession, StoredUser};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Tables {
    developers: HashMap<String, StoredDeveloper>,
    developer_emails: HashMap<String, String>,
    applications: HashMap<String, Application>,
    public_keys: HashMap<String, String>,
    secret_keys: HashSet<String>,
    users: HashMap<String, StoredUser>,
    // (application_id, email) -> user id
    user_emails: HashMap<(String, String), String>,
    sessions: HashMap<String, StoredSession>,
    session_tokens: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_developer(&self, developer: &StoredDeveloper) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.developer_emails.contains_key(&developer.email) {
            return Err(StoreError::Conflict("Developer"));
        }
        t.developer_emails
            .insert(developer.email.clone(), developer.id.clone());
        t.developers.insert(developer.id.clone(), developer.clone());
        Ok(())
    }

    async fn get_developer(&self, id: &str) -> Result<Option<StoredDeveloper>, StoreError> {
        Ok(self.tables.read().developers.get(id).cloned())
    }

    async fn get_developer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StoredDeveloper>, StoreError> {
        let t = self.tables.read();
        Ok(t.developer_emails
            .get(email)
            .and_then(|id| t.developers.get(id))
            .cloned())
    }

    async fn create_application(&self, application: &Application) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.public_keys.contains_key(&application.public_key)
            || t.secret_keys.contains(&application.secret_key)
        {
            return Err(StoreError::Conflict("Application key"));
        }
        t.public_keys
            .insert(application.public_key.clone(), application.id.clone());
        t.secret_keys.insert(application.secret_key.clone());
        t.applications
            .insert(application.id.clone(), application.clone());
        Ok(())
    }

    async fn list_applications(&self, developer_id: &str) -> Result<Vec<Application>, StoreError> {
        let t = self.tables.read();
        let mut apps: Vec<Application> = t
            .applications
            .values()
            .filter(|app| app.developer_id == developer_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(apps)
    }

    async fn get_application(
        &self,
        id: &str,
        developer_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .tables
            .read()
            .applications
            .get(id)
            .filter(|app| app.developer_id == developer_id)
            .cloned())
    }

    async fn update_application(
        &self,
        id: &str,
        developer_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<Option<Application>, StoreError> {
        let mut t = self.tables.write();
        match t.applications.get_mut(id) {
            Some(app) if app.developer_id == developer_id => {
                app.name = name.to_string();
                app.domain = domain.to_string();
                Ok(Some(app.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_application(&self, id: &str, developer_id: &str) -> Result<bool, StoreError> {
        let mut t = self.tables.write();
        let owned = t
            .applications
            .get(id)
            .is_some_and(|app| app.developer_id == developer_id);
        if !owned {
            return Ok(false);
        }

        if let Some(app) = t.applications.remove(id) {
            t.public_keys.remove(&app.public_key);
            t.secret_keys.remove(&app.secret_key);
        }

        t.users.retain(|_, user| user.application_id != id);
        t.user_emails.retain(|(app_id, _), _| app_id != id);

        let tokens: Vec<String> = t
            .sessions
            .values()
            .filter(|s| s.application_id == id)
            .map(|s| s.token.clone())
            .collect();
        for token in &tokens {
            t.session_tokens.remove(token);
        }
        t.sessions.retain(|_, s| s.application_id != id);

        Ok(true)
    }

    async fn get_application_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Application>, StoreError> {
        let t = self.tables.read();
        Ok(t.public_keys
            .get(public_key)
            .and_then(|id| t.applications.get(id))
            .cloned())
    }

    async fn create_user(&self, user: &StoredUser) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        let key = (user.application_id.clone(), user.email.clone());
        if t.user_emails.contains_key(&key) {
            return Err(StoreError::Conflict("User"));
        }
        t.user_emails.insert(key, user.id.clone());
        t.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<StoredUser>, StoreError> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    async fn get_user_by_email(
        &self,
        application_id: &str,
        email: &str,
    ) -> Result<Option<StoredUser>, StoreError> {
        let t = self.tables.read();
        let key = (application_id.to_string(), email.to_string());
        Ok(t.user_emails
            .get(&key)
            .and_then(|id| t.users.get(id))
            .cloned())
    }

    async fn list_users(&self, application_id: &str) -> Result<Vec<StoredUser>, StoreError> {
        let t = self.tables.read();
        let mut users: Vec<StoredUser> = t
            .users
            .values()
            .filter(|user| user.application_id == application_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn create_session(&self, session: &StoredSession) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.session_tokens.contains_key(&session.token) {
            return Err(StoreError::Conflict("Session"));
        }
        t.session_tokens
            .insert(session.token.clone(), session.id.clone());
        t.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_token(
        &self,
        token: &str,
    ) -> Result<Option<StoredSession>, StoreError> {
        let t = self.tables.read();
        Ok(t.session_tokens
            .get(token)
            .and_then(|id| t.sessions.get(id))
            .cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let mut t = self.tables.write();
        match t.sessions.remove(id) {
            Some(session) => {
                t.session_tokens.remove(&session.token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
