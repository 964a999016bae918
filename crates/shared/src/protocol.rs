use serde::{Deserialize, Serialize};

use crate::domain::{QueueKind, Settings, SubjectId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub id: SubjectId,
    pub text: String,
    /// `None` when vote counts are hidden from this viewer.
    pub votes: Option<u32>,
    pub voted: bool,
    pub can_delete: bool,
    pub can_choose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeView {
    pub is_admin: bool,
    pub queue: QueueKind,
    pub settings: Settings,
    pub subjects: Vec<SubjectEntry>,
    pub past_subjects: Vec<String>,
    pub votes_left: usize,
}

/// A message the front end should post to the announcement channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteToggle {
    Voted,
    Unvoted,
    QuotaExceeded,
}
