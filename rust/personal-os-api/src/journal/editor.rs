//! Server-side document editing sessions.
//!
//! A session wraps one [`AutosaveHandle`] per (user, document). Sessions are
//! opened explicitly, receive edits, and are closed with a final flush.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::autosave::{AutosaveError, AutosaveHandle, AutosaveStatus, Persist};
use super::store::EntryStore;
use crate::error::{AppError, AppResult};

/// Writes document content through the entry store.
#[derive(Debug, Clone)]
pub struct DocumentPersister {
    store: EntryStore,
    user_id: String,
    document_id: String,
}

impl DocumentPersister {
    #[must_use]
    pub fn new(store: EntryStore, user_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            document_id: document_id.into(),
        }
    }
}

#[async_trait]
impl Persist for DocumentPersister {
    type Content = String;

    async fn persist(&self, content: String) -> anyhow::Result<()> {
        self.store
            .update_document(&self.user_id, &self.document_id, content)
            .await
            .map(drop)
            .map_err(anyhow::Error::from)
    }
}

type SessionKey = (String, String);

/// Open editing sessions keyed by (user, document).
#[derive(Debug, Clone)]
pub struct EditorSessions {
    store: EntryStore,
    debounce: Duration,
    sessions: Arc<Mutex<HashMap<SessionKey, Arc<AutosaveHandle<String>>>>>,
}

impl EditorSessions {
    #[must_use]
    pub fn new(store: EntryStore, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(user_id: &str, document_id: &str) -> SessionKey {
        (user_id.to_string(), document_id.to_string())
    }

    fn session(&self, user_id: &str, document_id: &str) -> AppResult<Arc<AutosaveHandle<String>>> {
        self.sessions
            .lock()
            .get(&Self::key(user_id, document_id))
            .cloned()
            .ok_or(AppError::NotFound("Editing session"))
    }

    /// Open a session for a document the caller owns, or return the
    /// status of the one already open.
    pub async fn open(&self, user_id: &str, document_id: &str) -> AppResult<AutosaveStatus> {
        // Ownership check before any session exists.
        self.store.get_document(user_id, document_id).await?;

        let mut sessions = self.sessions.lock();
        let handle = sessions
            .entry(Self::key(user_id, document_id))
            .or_insert_with(|| {
                tracing::info!(user_id = %user_id, document_id = %document_id, "Editing session opened");
                Arc::new(AutosaveHandle::spawn(
                    DocumentPersister::new(self.store.clone(), user_id, document_id),
                    self.debounce,
                ))
            });
        Ok(handle.status())
    }

    /// Buffer an edit.
    pub fn edit(&self, user_id: &str, document_id: &str, content: String) -> AppResult<AutosaveStatus> {
        let handle = self.session(user_id, document_id)?;
        handle.edit(content).map_err(autosave_error)?;
        Ok(handle.status())
    }

    /// Flush now and report the outcome.
    pub async fn save(&self, user_id: &str, document_id: &str) -> AppResult<AutosaveStatus> {
        let handle = self.session(user_id, document_id)?;
        handle.save_now().await.map_err(autosave_error)?;
        Ok(handle.status())
    }

    pub fn status(&self, user_id: &str, document_id: &str) -> AppResult<AutosaveStatus> {
        Ok(self.session(user_id, document_id)?.status())
    }

    /// End the session, flushing unsaved content first.
    pub async fn close(&self, user_id: &str, document_id: &str) -> AppResult<AutosaveStatus> {
        let handle = self
            .sessions
            .lock()
            .remove(&Self::key(user_id, document_id))
            .ok_or(AppError::NotFound("Editing session"))?;

        let outcome = handle.save_now().await;
        let status = handle.status();
        // Last reference drops here; the actor exits once its channel closes.
        drop(handle);
        outcome.map_err(autosave_error)?;

        tracing::info!(user_id = %user_id, document_id = %document_id, saves = status.saves, "Editing session closed");
        Ok(status)
    }

    /// End a session and drop its unsaved content. Used when the document
    /// itself is being deleted.
    pub fn discard(&self, user_id: &str, document_id: &str) -> bool {
        let removed = self.sessions.lock().remove(&Self::key(user_id, document_id));
        match removed {
            Some(handle) => {
                handle.discard();
                tracing::info!(user_id = %user_id, document_id = %document_id, "Editing session discarded");
                true
            }
            None => false,
        }
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush and end every session. Used on shutdown.
    pub async fn close_all(&self) {
        let handles: Vec<_> = self.sessions.lock().drain().collect();
        for ((user_id, document_id), handle) in handles {
            if let Err(err) = handle.save_now().await {
                tracing::warn!(user_id = %user_id, document_id = %document_id, error = %err, "Final flush failed");
            }
        }
    }
}

fn autosave_error(err: AutosaveError) -> AppError {
    match err {
        AutosaveError::Closed => AppError::NotFound("Editing session"),
        AutosaveError::PersistFailed(message) => AppError::unavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::{UserRecord, UserRepository};
    use crate::database::{self, Database};
    use crate::domain::DocumentType;

    async fn sessions_for(users: &[&str]) -> EditorSessions {
        let db = Database::in_memory().await.unwrap();
        for id in users {
            db.insert_user(&UserRecord {
                id: (*id).to_string(),
                email: format!("{id}@example.com"),
                name: None,
                password_hash: "hash".to_string(),
                created_at: database::now(),
            })
            .await
            .unwrap();
        }
        EditorSessions::new(EntryStore::new(db), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_save_persists_buffered_edit() {
        let sessions = sessions_for(&["u1"]).await;
        let doc = sessions
            .store
            .get_or_create_document("u1", DocumentType::NorthStar)
            .await
            .unwrap();

        sessions.open("u1", &doc.id).await.unwrap();
        let status = sessions.edit("u1", &doc.id, "# Draft".to_string()).unwrap();
        assert!(status.has_unsaved_changes);

        let status = sessions.save("u1", &doc.id).await.unwrap();
        assert!(!status.has_unsaved_changes);
        assert_eq!(status.saves, 1);
        assert_eq!(sessions.store.get_document("u1", &doc.id).await.unwrap().content, "# Draft");
    }

    #[tokio::test]
    async fn test_close_flushes_and_forgets_session() {
        let sessions = sessions_for(&["u1"]).await;
        let doc = sessions
            .store
            .get_or_create_document("u1", DocumentType::Memory)
            .await
            .unwrap();

        sessions.open("u1", &doc.id).await.unwrap();
        sessions.edit("u1", &doc.id, "remember this".to_string()).unwrap();
        sessions.close("u1", &doc.id).await.unwrap();

        assert!(sessions.is_empty());
        assert_eq!(
            sessions.store.get_document("u1", &doc.id).await.unwrap().content,
            "remember this"
        );
        assert!(matches!(
            sessions.status("u1", &doc.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_is_owner_scoped() {
        let sessions = sessions_for(&["u1", "u2"]).await;
        let doc = sessions
            .store
            .get_or_create_document("u1", DocumentType::Principles)
            .await
            .unwrap();

        let err = sessions.open("u2", &doc.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            sessions.edit("u2", &doc.id, "hijack".to_string()),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_discard_skips_final_flush() {
        let sessions = sessions_for(&["u1"]).await;
        let doc = sessions
            .store
            .get_or_create_document("u1", DocumentType::Memory)
            .await
            .unwrap();
        let original = doc.content.clone();

        sessions.open("u1", &doc.id).await.unwrap();
        sessions.edit("u1", &doc.id, "never written".to_string()).unwrap();
        assert!(sessions.discard("u1", &doc.id));
        assert!(!sessions.discard("u1", &doc.id));

        // Give the actor time to run a close flush if it were going to.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sessions.is_empty());
        assert_eq!(
            sessions.store.get_document("u1", &doc.id).await.unwrap().content,
            original
        );
    }

    #[tokio::test]
    async fn test_reopen_reuses_session() {
        let sessions = sessions_for(&["u1"]).await;
        let doc = sessions
            .store
            .get_or_create_document("u1", DocumentType::FrameworkLifeMap)
            .await
            .unwrap();

        sessions.open("u1", &doc.id).await.unwrap();
        sessions.edit("u1", &doc.id, "v1".to_string()).unwrap();
        let status = sessions.open("u1", &doc.id).await.unwrap();

        assert_eq!(sessions.len(), 1);
        assert!(status.has_unsaved_changes);
        sessions.close_all().await;
        assert!(sessions.is_empty());
    }
}
