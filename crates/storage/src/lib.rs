//! Subject store: the queues of pending subjects, the per-user vote ledger,
//! the history of chosen subjects and the display settings, written through
//! to a [`SnapshotBackend`] after every mutation.

use std::path::PathBuf;

use shared::domain::{QueueKind, Settings, Subject, SubjectId, UserId};
use tracing::{debug, info, warn};

pub mod backend;
pub mod error;
pub mod snapshot;

pub use backend::{JsonFileBackend, SnapshotBackend};
pub use error::StoreError;
pub use snapshot::{Snapshot, VoteLedger, MAX_VOTES_PER_USER};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Owns all durable state. Callers that share a store across tasks must
/// serialize access to it; nothing in here locks.
#[derive(Debug)]
pub struct SubjectStore<B = JsonFileBackend> {
    snapshot: Snapshot,
    backend: B,
}

impl SubjectStore<JsonFileBackend> {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load(JsonFileBackend::new(path))
    }
}

impl<B: SnapshotBackend> SubjectStore<B> {
    /// Reads the persisted snapshot, or creates and persists an empty one
    /// when the backend holds nothing yet.
    pub fn load(backend: B) -> Result<Self> {
        let Some(mut snapshot) = backend.load()? else {
            let snapshot = Snapshot::default();
            backend.save(&snapshot)?;
            info!("initialised empty subject store");
            return Ok(Self { snapshot, backend });
        };

        let repairs = snapshot.reconcile();
        if repairs > 0 {
            warn!(repairs, "persisting repaired subject store");
            backend.save(&snapshot)?;
        }
        debug!(
            subjects = snapshot.subjects.len(),
            articles = snapshot.articles.len(),
            past = snapshot.past_subjects.len(),
            "subject store loaded"
        );
        Ok(Self { snapshot, backend })
    }

    /// Applies `mutate` to a copy of the state and adopts the copy only once
    /// the backend accepted it.
    fn commit<T>(&mut self, op: &'static str, mutate: impl FnOnce(&mut Snapshot) -> T) -> Result<T> {
        let mut next = self.snapshot.clone();
        let out = mutate(&mut next);
        self.backend.save(&next)?;
        self.snapshot = next;
        debug!(op, "store committed");
        Ok(out)
    }

    pub fn insert(&mut self, text: &str, author: &UserId) -> Result<Subject> {
        let Some(next) = self.snapshot.last_id.checked_add(1) else {
            return Err(StoreError::IdsExhausted);
        };
        let subject = self.commit("insert", |snapshot| {
            let subject = Subject {
                id: SubjectId(next),
                text: text.to_string(),
                author: author.clone(),
                vote_count: 0,
            };
            snapshot.last_id = subject.id.0;
            let kind = snapshot.settings.selected_queue();
            snapshot.queue_mut(kind).push(subject.clone());
            subject
        })?;
        info!(id = %subject.id, author = %author, "subject submitted");
        Ok(subject)
    }

    /// Removes a live subject and every vote on it. Returns whether anything
    /// was removed; an unknown id is not an error.
    pub fn delete(&mut self, id: SubjectId) -> Result<bool> {
        let removed = self.commit("delete", |snapshot| snapshot.remove_subject(id))?;
        if removed.is_some() {
            info!(%id, "subject deleted");
        }
        Ok(removed.is_some())
    }

    /// Removes the subject like [`delete`](Self::delete) and appends its text
    /// to the history. `None` means it was already gone.
    pub fn choose(&mut self, id: SubjectId) -> Result<Option<Subject>> {
        let chosen = self.commit("choose", |snapshot| {
            let removed = snapshot.remove_subject(id);
            if let Some(subject) = &removed {
                snapshot.past_subjects.push(subject.text.clone());
            }
            removed
        })?;
        match &chosen {
            Some(subject) => info!(%id, votes = subject.vote_count, "subject chosen"),
            None => debug!(%id, "choose on a subject that is already gone"),
        }
        Ok(chosen)
    }

    /// Subjects of the queue selected by the article flag, in submission
    /// order.
    pub fn list_subjects(&self) -> Vec<Subject> {
        self.snapshot.queue(self.selected_queue()).to_vec()
    }

    /// Records a vote. `Ok(false)` means the user is already at
    /// [`MAX_VOTES_PER_USER`]. Voting twice for the same subject is accepted
    /// once and ignored afterwards.
    pub fn vote(&mut self, user: &UserId, id: SubjectId) -> Result<bool> {
        if !self.snapshot.is_live(id) {
            return Err(StoreError::NotLive(id));
        }
        if self.snapshot.voted.contains(user, id) {
            debug!(%user, %id, "repeated vote ignored");
            return Ok(true);
        }
        if self.snapshot.voted.entry(user).len() >= MAX_VOTES_PER_USER {
            debug!(%user, %id, "vote quota exhausted");
            return Ok(false);
        }

        self.commit("vote", |snapshot| {
            snapshot.voted.push(user, id);
            if let Some(subject) = snapshot.find_mut(id) {
                subject.vote_count += 1;
            }
        })?;
        Ok(true)
    }

    /// Withdraws a vote. Withdrawing a vote the user never cast changes
    /// nothing.
    pub fn unvote(&mut self, user: &UserId, id: SubjectId) -> Result<bool> {
        if !self.snapshot.is_live(id) {
            return Err(StoreError::NotLive(id));
        }
        if !self.snapshot.voted.contains(user, id) {
            return Ok(true);
        }

        self.commit("unvote", |snapshot| {
            if snapshot.voted.remove(user, id) {
                if let Some(subject) = snapshot.find_mut(id) {
                    subject.vote_count = subject.vote_count.saturating_sub(1);
                }
            }
        })?;
        Ok(true)
    }

    /// Clears every vote in both queues. History is left alone.
    pub fn reset_votes(&mut self) -> Result<()> {
        self.commit("reset_votes", |snapshot| {
            snapshot.voted.clear();
            for subject in snapshot
                .subjects
                .iter_mut()
                .chain(snapshot.articles.iter_mut())
            {
                subject.vote_count = 0;
            }
        })?;
        info!("votes reset");
        Ok(())
    }

    pub fn toggle_show_votes(&mut self, show: bool) -> Result<()> {
        self.commit("toggle_show_votes", |snapshot| {
            snapshot.settings.show_votes = show
        })
    }

    /// Switches which queue receives submissions and backs
    /// [`list_subjects`](Self::list_subjects). Subjects already queued stay
    /// where they are, so the other queue's content is hidden until the flag
    /// is switched back.
    pub fn toggle_show_articles(&mut self, show: bool) -> Result<()> {
        self.commit("toggle_show_articles", |snapshot| {
            snapshot.settings.show_articles = show
        })
    }

    pub fn past_subjects(&self) -> &[String] {
        &self.snapshot.past_subjects
    }

    pub fn votes_of(&self, user: &UserId) -> &[SubjectId] {
        self.snapshot.voted.entry(user)
    }

    pub fn settings(&self) -> Settings {
        self.snapshot.settings
    }

    pub fn show_votes(&self) -> bool {
        self.snapshot.settings.show_votes
    }

    pub fn show_articles(&self) -> bool {
        self.snapshot.settings.show_articles
    }

    pub fn selected_queue(&self) -> QueueKind {
        self.snapshot.settings.selected_queue()
    }

    /// Either queue, regardless of the article flag.
    pub fn queue(&self, kind: QueueKind) -> &[Subject] {
        self.snapshot.queue(kind)
    }

    /// A live subject from either queue.
    pub fn find(&self, id: SubjectId) -> Option<&Subject> {
        self.snapshot.find(id).map(|(_, subject)| subject)
    }

    pub fn next_id(&self) -> SubjectId {
        self.snapshot.next_id()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
