use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use shared::domain::{QueueKind, Settings, Subject, SubjectId, UserId};
use tracing::warn;

/// Upper bound on the number of live subjects a single user may vote for.
pub const MAX_VOTES_PER_USER: usize = 3;

/// Everything the store persists, in the layout of the backing file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    pub subjects: Vec<Subject>,
    pub articles: Vec<Subject>,
    pub past_subjects: Vec<String>,
    pub voted: VoteLedger,
    /// Last id handed out; `0` until the first insert.
    pub last_id: u64,
    #[serde(flatten)]
    pub settings: Settings,
}

impl Snapshot {
    pub fn queue(&self, kind: QueueKind) -> &[Subject] {
        match kind {
            QueueKind::Active => &self.subjects,
            QueueKind::Article => &self.articles,
        }
    }

    pub fn queue_mut(&mut self, kind: QueueKind) -> &mut Vec<Subject> {
        match kind {
            QueueKind::Active => &mut self.subjects,
            QueueKind::Article => &mut self.articles,
        }
    }

    /// Saturates at `u64::MAX`; inserting refuses to run once the counter is
    /// exhausted.
    pub fn next_id(&self) -> SubjectId {
        SubjectId(self.last_id.saturating_add(1))
    }

    pub fn find(&self, id: SubjectId) -> Option<(QueueKind, &Subject)> {
        [QueueKind::Active, QueueKind::Article]
            .into_iter()
            .find_map(|kind| {
                self.queue(kind)
                    .iter()
                    .find(|subject| subject.id == id)
                    .map(|subject| (kind, subject))
            })
    }

    pub fn find_mut(&mut self, id: SubjectId) -> Option<&mut Subject> {
        self.subjects
            .iter_mut()
            .chain(self.articles.iter_mut())
            .find(|subject| subject.id == id)
    }

    pub fn is_live(&self, id: SubjectId) -> bool {
        self.find(id).is_some()
    }

    /// Drops the subject from whichever queue holds it and scrubs its id from
    /// every ledger entry.
    pub(crate) fn remove_subject(&mut self, id: SubjectId) -> Option<Subject> {
        let mut removed = None;
        for kind in [QueueKind::Active, QueueKind::Article] {
            self.queue_mut(kind).retain(|subject| {
                if subject.id != id {
                    return true;
                }
                if removed.is_none() {
                    removed = Some(subject.clone());
                }
                false
            });
        }
        self.voted.scrub(id);
        removed
    }

    /// Brings a snapshot read from disk back in line with the store
    /// invariants. Returns the number of repairs applied.
    pub fn reconcile(&mut self) -> usize {
        let mut repairs = 0;
        let mut live = HashSet::new();
        for kind in [QueueKind::Active, QueueKind::Article] {
            self.queue_mut(kind).retain(|subject| {
                if live.insert(subject.id) {
                    return true;
                }
                warn!(
                    id = %subject.id,
                    queue = ?kind,
                    text = %subject.text,
                    "dropped subject with a duplicated id"
                );
                repairs += 1;
                false
            });
        }

        for (user, ids) in self.voted.entries.iter_mut() {
            let before = ids.len();
            let mut seen = HashSet::new();
            ids.retain(|id| live.contains(id) && seen.insert(*id));
            ids.truncate(MAX_VOTES_PER_USER);
            if ids.len() != before {
                warn!(
                    user = %user,
                    dropped = before - ids.len(),
                    "dropped dangling, duplicate or over-cap votes"
                );
                repairs += 1;
            }
        }
        self.voted.entries.retain(|_, ids| !ids.is_empty());

        let ledger = &self.voted;
        for subject in self.subjects.iter_mut().chain(self.articles.iter_mut()) {
            let expected = ledger.count_for(subject.id);
            if subject.vote_count != expected {
                warn!(
                    id = %subject.id,
                    stored = subject.vote_count,
                    expected,
                    "vote count disagreed with ledger"
                );
                subject.vote_count = expected;
                repairs += 1;
            }
        }

        if let Some(max_live) = live.iter().map(|id| id.0).max() {
            if max_live > self.last_id {
                warn!(
                    last_id = self.last_id,
                    max_live, "id counter was behind a live subject"
                );
                self.last_id = max_live;
                repairs += 1;
            }
        }

        repairs
    }
}

/// Per-user record of active votes, in the order they were cast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TaggedLedger", into = "TaggedLedger")]
pub struct VoteLedger {
    entries: BTreeMap<UserId, Vec<SubjectId>>,
}

impl VoteLedger {
    pub fn entry(&self, user: &UserId) -> &[SubjectId] {
        self.entries.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, user: &UserId, id: SubjectId) -> bool {
        self.entry(user).contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &[SubjectId])> {
        self.entries.iter().map(|(user, ids)| (user, ids.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of users currently voting for `id`.
    pub fn count_for(&self, id: SubjectId) -> u32 {
        self.entries
            .values()
            .map(|ids| ids.iter().filter(|voted| **voted == id).count() as u32)
            .sum()
    }

    pub(crate) fn push(&mut self, user: &UserId, id: SubjectId) {
        self.entries.entry(user.clone()).or_default().push(id);
    }

    pub(crate) fn remove(&mut self, user: &UserId, id: SubjectId) -> bool {
        let Some(ids) = self.entries.get_mut(user) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|voted| *voted != id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.entries.remove(user);
        }
        removed
    }

    pub(crate) fn scrub(&mut self, id: SubjectId) {
        for ids in self.entries.values_mut() {
            ids.retain(|voted| *voted != id);
        }
        self.entries.retain(|_, ids| !ids.is_empty());
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<const N: usize> From<[(UserId, Vec<SubjectId>); N]> for VoteLedger {
    fn from(value: [(UserId, Vec<SubjectId>); N]) -> Self {
        TaggedLedger::Map(value.into()).into()
    }
}

/// On-disk form of the ledger: `{"dataType": "Map", "value": [[user, [ids]]]}`.
#[derive(Serialize, Deserialize)]
#[serde(tag = "dataType", content = "value")]
enum TaggedLedger {
    Map(Vec<(UserId, Vec<SubjectId>)>),
}

impl From<TaggedLedger> for VoteLedger {
    fn from(value: TaggedLedger) -> Self {
        let TaggedLedger::Map(pairs) = value;
        // Later pairs overwrite earlier ones with the same key.
        Self {
            entries: pairs.into_iter().collect(),
        }
    }
}

impl From<VoteLedger> for TaggedLedger {
    fn from(value: VoteLedger) -> Self {
        TaggedLedger::Map(value.entries.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod tests;
