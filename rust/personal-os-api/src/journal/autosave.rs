//! Debounced autosave for an editing session.
//!
//! Each session is a small actor task. Edits replace the buffered content and
//! re-arm a debounce timer; when the timer fires (or a save is forced) the
//! buffer is handed to a [`Persist`] implementation. At most one persist is
//! in flight per session. A flush requested while one is running is held
//! until it completes and then re-evaluated against the latest content.
//!
//! ```text
//! Idle --edit--> Scheduled --timer/save--> Saving --ok--> Idle
//!                    ^  |                     |
//!                    +--+ edit                +--err--> Dirty --edit/save--> ...
//! ```
//!
//! Dropping the [`AutosaveHandle`] ends the session; unsaved content is
//! flushed once, best effort. [`AutosaveHandle::discard`] ends it without
//! writing the buffer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Writes buffered content somewhere durable.
#[async_trait]
pub trait Persist: Send + Sync + 'static {
    type Content: Clone + Send + Sync + 'static;

    async fn persist(&self, content: Self::Content) -> anyhow::Result<()>;
}

/// Autosave failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutosaveError {
    #[error("Save failed: {0}")]
    PersistFailed(String),

    #[error("Editing session has ended")]
    Closed,
}

/// Where the session is in its save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    /// Nothing unsaved.
    Idle,
    /// Unsaved content, no flush scheduled (after a failed save).
    Dirty,
    /// Unsaved content, debounce timer armed.
    Scheduled,
    /// A persist is in flight.
    Saving,
}

/// Snapshot of a session, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveStatus {
    pub state: SaveState,
    pub has_unsaved_changes: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Successful persists so far.
    pub saves: u64,
}

impl Default for AutosaveStatus {
    fn default() -> Self {
        Self {
            state: SaveState::Idle,
            has_unsaved_changes: false,
            last_saved_at: None,
            last_error: None,
            saves: 0,
        }
    }
}

type Reply = oneshot::Sender<Result<(), AutosaveError>>;

enum Command<T> {
    Edit(T),
    SaveNow(Reply),
    Close(Reply),
    Discard,
}

/// Client side of an autosave session.
pub struct AutosaveHandle<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
    status: Arc<watch::Sender<AutosaveStatus>>,
}

impl<T> std::fmt::Debug for AutosaveHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveHandle")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> AutosaveHandle<T> {
    /// Start a session that flushes `debounce` after the last edit.
    pub fn spawn<P>(persister: P, debounce: Duration) -> Self
    where
        P: Persist<Content = T>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(watch::Sender::new(AutosaveStatus::default()));
        let actor = Actor {
            persister: Arc::new(persister),
            debounce,
            buffer: None,
            revision: 0,
            saved_revision: 0,
            deadline: None,
            in_flight: None,
            flush_requested: false,
            closing: false,
            waiters: Vec::new(),
            status: Arc::clone(&status),
        };
        tokio::spawn(actor.run(rx));
        Self { tx, status }
    }

    /// Buffer new content and restart the debounce window.
    pub fn edit(&self, content: T) -> Result<(), AutosaveError> {
        self.tx
            .send(Command::Edit(content))
            .map_err(|_closed| AutosaveError::Closed)?;
        // Visible to readers before the actor gets to the edit.
        self.status.send_modify(|s| {
            s.has_unsaved_changes = true;
            if s.state != SaveState::Saving {
                s.state = SaveState::Scheduled;
            }
        });
        Ok(())
    }

    /// Cancel any pending timer and persist now. Resolves once the content
    /// buffered at the time of the call is persisted, or with the error of
    /// the failed persist. Edits made afterwards do not delay it.
    pub async fn save_now(&self) -> Result<(), AutosaveError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SaveNow(reply))
            .map_err(|_closed| AutosaveError::Closed)?;
        rx.await.map_err(|_closed| AutosaveError::Closed)?
    }

    /// End the session, flushing unsaved content first.
    pub async fn close(self) -> Result<(), AutosaveError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Close(reply))
            .map_err(|_closed| AutosaveError::Closed)?;
        rx.await.map_err(|_closed| AutosaveError::Closed)?
    }

    #[must_use]
    pub fn status(&self) -> AutosaveStatus {
        self.status.borrow().clone()
    }

    /// End the session and drop the buffer. A persist already running
    /// still completes; nothing further is written.
    pub fn discard(&self) {
        let _ = self.tx.send(Command::Discard);
    }

    /// Stream of status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.status.subscribe()
    }
}

struct Actor<P: Persist> {
    persister: Arc<P>,
    debounce: Duration,
    /// Latest content not yet known to be persisted.
    buffer: Option<P::Content>,
    /// Bumped on every edit.
    revision: u64,
    /// Revision of the last successful persist.
    saved_revision: u64,
    deadline: Option<Instant>,
    in_flight: Option<(u64, JoinHandle<anyhow::Result<()>>)>,
    /// A forced flush arrived while saving.
    flush_requested: bool,
    closing: bool,
    /// Forced-save callers with the revision each one needs persisted.
    waiters: Vec<(u64, Reply)>,
    status: Arc<watch::Sender<AutosaveStatus>>,
}

impl<P: Persist> Actor<P> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command<P::Content>>) {
        loop {
            if self.closing && self.in_flight.is_none() && !self.flush_requested {
                break;
            }

            let deadline = self.deadline;
            let timer_armed = deadline.is_some() && self.in_flight.is_none() && !self.closing;

            tokio::select! {
                cmd = rx.recv(), if !self.closing => match cmd {
                    Some(Command::Edit(content)) => self.on_edit(content),
                    Some(Command::SaveNow(reply)) => self.on_force(reply),
                    Some(Command::Close(reply)) => {
                        self.closing = true;
                        self.on_force(reply);
                    }
                    Some(Command::Discard) => self.on_discard(),
                    None => {
                        // Handle dropped: best-effort final flush.
                        self.closing = true;
                        self.deadline = None;
                        if self.is_dirty() {
                            self.flush_requested = true;
                            self.start_flush_if_idle();
                        }
                    }
                },
                () = sleep_until_opt(deadline), if timer_armed => {
                    self.deadline = None;
                    self.start_flush_if_idle();
                }
                joined = join_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.on_persisted(joined);
                }
            }
        }

        tracing::debug!(saves = self.status.borrow().saves, "Autosave session ended");
    }

    fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    fn on_edit(&mut self, content: P::Content) {
        self.revision += 1;
        self.buffer = Some(content);
        self.deadline = Some(Instant::now() + self.debounce);
        self.publish();
    }

    fn on_force(&mut self, reply: Reply) {
        self.deadline = None;
        if !self.is_dirty() && self.in_flight.is_none() {
            let _ = reply.send(Ok(()));
            self.publish();
            return;
        }
        self.waiters.push((self.revision, reply));
        self.flush_requested = true;
        self.start_flush_if_idle();
    }

    fn on_discard(&mut self) {
        self.closing = true;
        self.deadline = None;
        self.flush_requested = false;
        self.buffer = None;
        self.saved_revision = self.revision;
        self.resolve_waiters(&Err(AutosaveError::Closed));
        self.publish();
    }

    fn start_flush_if_idle(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        self.flush_requested = false;

        match self.buffer.clone().filter(|_| self.is_dirty()) {
            Some(content) => {
                let persister = Arc::clone(&self.persister);
                let revision = self.revision;
                let task = tokio::spawn(async move { persister.persist(content).await });
                self.in_flight = Some((revision, task));
            }
            None => self.resolve_waiters(&Ok(())),
        }
        self.publish();
    }

    fn on_persisted(&mut self, (revision, result): (u64, anyhow::Result<()>)) {
        self.in_flight = None;

        match result {
            Ok(()) => {
                self.saved_revision = self.saved_revision.max(revision);
                if !self.is_dirty() {
                    self.buffer = None;
                }
                self.status.send_modify(|s| {
                    s.last_saved_at = Some(Utc::now());
                    s.last_error = None;
                    s.saves += 1;
                });

                self.resolve_saved_waiters();
                let wanted = self.flush_requested || self.closing || !self.waiters.is_empty();
                if self.is_dirty() && wanted {
                    self.start_flush_if_idle();
                    return;
                }
                if !self.is_dirty() {
                    self.flush_requested = false;
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(error = %message, "Autosave persist failed");
                self.status.send_modify(|s| s.last_error = Some(message.clone()));
                // No automatic retry: wait for the next edit or forced save.
                self.flush_requested = false;
                self.resolve_waiters(&Err(AutosaveError::PersistFailed(message)));
            }
        }
        self.publish();
    }

    fn resolve_waiters(&mut self, outcome: &Result<(), AutosaveError>) {
        for (_, waiter) in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Answer every forced save whose content is now persisted. Later edits
    /// do not hold them back.
    fn resolve_saved_waiters(&mut self) {
        let saved = self.saved_revision;
        let (done, pending): (Vec<_>, Vec<_>) =
            self.waiters.drain(..).partition(|(needed, _)| *needed <= saved);
        self.waiters = pending;
        for (_, waiter) in done {
            let _ = waiter.send(Ok(()));
        }
    }

    fn publish(&self) {
        let dirty = self.is_dirty();
        let state = if self.in_flight.is_some() {
            SaveState::Saving
        } else if !dirty {
            SaveState::Idle
        } else if self.deadline.is_some() {
            SaveState::Scheduled
        } else {
            SaveState::Dirty
        };
        self.status.send_modify(|s| {
            s.state = state;
            s.has_unsaved_changes = dirty;
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(
    in_flight: &mut Option<(u64, JoinHandle<anyhow::Result<()>>)>,
) -> (u64, anyhow::Result<()>) {
    match in_flight {
        Some((revision, task)) => {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::anyhow!("Persist task aborted: {join_err}")),
            };
            (*revision, result)
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(30);

    #[derive(Clone, Default)]
    struct Recorder {
        writes: Arc<Mutex<Vec<String>>>,
        delay: Duration,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        fail_next: Arc<AtomicBool>,
    }

    impl Recorder {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn writes(&self) -> Vec<String> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl Persist for Recorder {
        type Content = String;

        async fn persist(&self, content: String) -> anyhow::Result<()> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_next.swap(false, Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.writes.lock().push(content);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_write() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);

        for i in 1..=5 {
            handle.edit(format!("draft {i}")).unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert_eq!(handle.status().state, SaveState::Scheduled);
        assert!(recorder.writes().is_empty());

        tokio::time::sleep(DEBOUNCE).await;
        assert_eq!(recorder.writes(), vec!["draft 5".to_string()]);

        let status = handle.status();
        assert_eq!(status.state, SaveState::Idle);
        assert!(!status.has_unsaved_changes);
        assert!(status.last_saved_at.is_some());
        assert_eq!(status.saves, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_forces_flush_before_window() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);
        let started = Instant::now();

        handle.edit("unsaved".to_string()).unwrap();
        handle.close().await.unwrap();

        assert!(started.elapsed() < DEBOUNCE);
        assert_eq!(recorder.writes(), vec!["unsaved".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_cancels_pending_timer() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);

        handle.edit("v1".to_string()).unwrap();
        handle.save_now().await.unwrap();
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(recorder.writes(), vec!["v1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_when_clean_is_a_no_op() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);
        handle.save_now().await.unwrap();
        assert!(recorder.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_in_flight_write_with_follow_up() {
        let recorder = Recorder::slow(Duration::from_secs(5));
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);

        handle.edit("first".to_string()).unwrap();
        tokio::time::sleep(DEBOUNCE + Duration::from_secs(1)).await;
        assert_eq!(handle.status().state, SaveState::Saving);

        // Edit and force a save while the first persist is still running.
        handle.edit("second".to_string()).unwrap();
        handle.save_now().await.unwrap();

        assert_eq!(
            recorder.writes(),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(recorder.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status().state, SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_now_resolves_when_its_content_lands() {
        let recorder = Recorder::slow(Duration::from_secs(5));
        let handle = Arc::new(AutosaveHandle::spawn(recorder.clone(), DEBOUNCE));
        let started = Instant::now();

        handle.edit("v1".to_string()).unwrap();
        let saver = tokio::spawn({
            let handle = Arc::clone(&handle);
            async move { handle.save_now().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.edit("v2".to_string()).unwrap();

        saver.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(recorder.writes(), vec!["v1".to_string()]);
        assert!(handle.status().has_unsaved_changes);

        // The later edit still goes out on its own timer.
        tokio::time::sleep(DEBOUNCE + Duration::from_secs(10)).await;
        assert_eq!(recorder.writes(), vec!["v1".to_string(), "v2".to_string()]);
        assert!(!handle.status().has_unsaved_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_buffer() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);

        handle.edit("gone".to_string()).unwrap();
        handle.discard();
        drop(handle);

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert!(recorder.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_returns_to_dirty_and_retries_on_save() {
        let recorder = Recorder::default();
        recorder.fail_next.store(true, Ordering::SeqCst);
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);

        handle.edit("content".to_string()).unwrap();
        let err = handle.save_now().await.unwrap_err();
        assert!(matches!(err, AutosaveError::PersistFailed(ref m) if m.contains("disk full")));

        let status = handle.status();
        assert_eq!(status.state, SaveState::Dirty);
        assert!(status.has_unsaved_changes);
        assert!(status.last_error.is_some());

        // No automatic retry.
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert!(recorder.writes().is_empty());

        handle.save_now().await.unwrap();
        assert_eq!(recorder.writes(), vec!["content".to_string()]);
        assert_eq!(handle.status().last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_flushes_once() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder.clone(), DEBOUNCE);
        handle.edit("last words".to_string()).unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.writes(), vec!["last words".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_stream_reports_saving() {
        let recorder = Recorder::slow(Duration::from_secs(2));
        let handle = AutosaveHandle::spawn(recorder, DEBOUNCE);
        let mut status = handle.subscribe();

        handle.edit("x".to_string()).unwrap();
        let saving = status
            .wait_for(|s| s.state == SaveState::Saving)
            .await
            .map(|s| s.clone())
            .unwrap();
        assert!(saving.has_unsaved_changes);

        let idle = status
            .wait_for(|s| s.state == SaveState::Idle && s.saves == 1)
            .await
            .map(|s| s.clone())
            .unwrap();
        assert!(!idle.has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_edit_after_close_is_rejected() {
        let recorder = Recorder::default();
        let handle = AutosaveHandle::spawn(recorder, DEBOUNCE);
        let other = AutosaveHandle {
            tx: handle.tx.clone(),
            status: Arc::clone(&handle.status),
        };
        handle.close().await.unwrap();
        // The actor stops reading once closed.
        tokio::task::yield_now().await;
        assert_eq!(other.save_now().await, Err(AutosaveError::Closed));
    }
}
