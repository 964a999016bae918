use std::{collections::BTreeSet, sync::Arc};

use shared::{
    domain::{Subject, SubjectId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{Announcement, HomeView, SubjectEntry, VoteToggle},
};
use storage::{StoreError, SubjectStore, MAX_VOTES_PER_USER};
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    sync::Mutex,
    task,
};
use tracing::{error, info};

/// Deployment settings the front end applies around the store.
#[derive(Debug, Clone, Default)]
pub struct FrontEndConfig {
    pub admins: BTreeSet<UserId>,
    pub channel: String,
    pub meet_url: String,
    pub presentation_url: String,
}

impl FrontEndConfig {
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }
}

#[derive(Clone)]
pub struct ApiContext {
    store: Arc<Mutex<SubjectStore>>,
    pub config: Arc<FrontEndConfig>,
}

impl ApiContext {
    pub fn new(store: SubjectStore, config: FrontEndConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(config),
        }
    }

    /// Runs `op` with exclusive access to the store. Every read-modify-persist
    /// sequence goes through here, one at a time.
    ///
    /// `op` writes the store file synchronously. On a multi-threaded runtime
    /// the worker is handed over with `block_in_place` while it runs; a
    /// current-thread runtime cannot do that and runs `op` inline.
    pub async fn with_store<T>(&self, op: impl FnOnce(&mut SubjectStore) -> T) -> T {
        let mut store = self.store.lock().await;
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => task::block_in_place(|| op(&mut *store)),
            _ => op(&mut *store),
        }
    }
}

pub async fn home_view(ctx: &ApiContext, user: &UserId) -> HomeView {
    let is_admin = ctx.config.is_admin(user);
    ctx.with_store(|store| {
        let settings = store.settings();
        let show_votes = is_admin || settings.show_votes;
        let mut subjects = store.list_subjects();
        if is_admin {
            subjects.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
        }
        let voted = store.votes_of(user);

        HomeView {
            is_admin,
            queue: settings.selected_queue(),
            settings,
            subjects: subjects
                .into_iter()
                .map(|subject| SubjectEntry {
                    voted: voted.contains(&subject.id),
                    can_delete: is_admin || subject.author == *user,
                    can_choose: is_admin,
                    votes: show_votes.then_some(subject.vote_count),
                    id: subject.id,
                    text: subject.text,
                })
                .collect(),
            past_subjects: store.past_subjects().to_vec(),
            votes_left: MAX_VOTES_PER_USER.saturating_sub(voted.len()),
        }
    })
    .await
}

pub async fn submit_subject(
    ctx: &ApiContext,
    user: &UserId,
    text: &str,
) -> Result<Subject, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "subject text is empty"));
    }
    ctx.with_store(|store| store.insert(text, user))
        .await
        .map_err(store_error)
}

/// Admins may delete any subject, everyone else only their own. Deleting a
/// subject that is already gone succeeds with `false`.
pub async fn delete_subject(
    ctx: &ApiContext,
    user: &UserId,
    id: SubjectId,
) -> Result<bool, ApiError> {
    let is_admin = ctx.config.is_admin(user);
    ctx.with_store(|store| {
        let Some(subject) = store.find(id) else {
            return Ok(false);
        };
        if !is_admin && subject.author != *user {
            return Err(ApiError::new(
                ErrorCode::Forbidden,
                "only the author or an admin may delete a subject",
            ));
        }
        store.delete(id).map_err(store_error)
    })
    .await
}

/// Moves the subject into history and returns the announcement to post.
/// `None` means someone else already removed it; the caller should refresh.
pub async fn choose_subject(
    ctx: &ApiContext,
    user: &UserId,
    id: SubjectId,
) -> Result<Option<Announcement>, ApiError> {
    ensure_admin(ctx, user)?;
    let chosen = ctx
        .with_store(|store| store.choose(id))
        .await
        .map_err(store_error)?;
    let Some(subject) = chosen else {
        return Ok(None);
    };
    info!(%id, chosen_by = %user, "announcing chosen subject");

    Ok(Some(Announcement {
        channel: ctx.config.channel.clone(),
        text: format!(
            "*Starting soon!*\nChosen topic: *{}*\nJoin the call <{}|here> and follow the slides <{}|here>.",
            subject.text, ctx.config.meet_url, ctx.config.presentation_url
        ),
    }))
}

/// Withdraws the user's vote on `id` if they have one, casts it otherwise.
pub async fn switch_vote(
    ctx: &ApiContext,
    user: &UserId,
    id: SubjectId,
) -> Result<VoteToggle, ApiError> {
    ctx.with_store(|store| -> Result<VoteToggle, StoreError> {
        if store.votes_of(user).contains(&id) {
            store.unvote(user, id)?;
            return Ok(VoteToggle::Unvoted);
        }
        if store.vote(user, id)? {
            Ok(VoteToggle::Voted)
        } else {
            Ok(VoteToggle::QuotaExceeded)
        }
    })
    .await
    .map_err(store_error)
}

pub async fn reset_votes(ctx: &ApiContext, user: &UserId) -> Result<(), ApiError> {
    ensure_admin(ctx, user)?;
    ctx.with_store(|store| store.reset_votes())
        .await
        .map_err(store_error)
}

/// Flips vote visibility for non-admins and returns the new value.
pub async fn toggle_show_votes(ctx: &ApiContext, user: &UserId) -> Result<bool, ApiError> {
    ensure_admin(ctx, user)?;
    ctx.with_store(|store| {
        let show = !store.show_votes();
        store.toggle_show_votes(show).map(|()| show)
    })
    .await
    .map_err(store_error)
}

pub async fn set_show_articles(
    ctx: &ApiContext,
    user: &UserId,
    show: bool,
) -> Result<(), ApiError> {
    ensure_admin(ctx, user)?;
    ctx.with_store(|store| store.toggle_show_articles(show))
        .await
        .map_err(store_error)
}

/// Announcement listing every pending subject of the selected queue.
pub async fn send_topics(ctx: &ApiContext, user: &UserId) -> Result<Announcement, ApiError> {
    ensure_admin(ctx, user)?;
    let subjects = ctx.with_store(|store| store.list_subjects()).await;
    let bullets = subjects
        .iter()
        .map(|subject| format!("• {}", subject.text))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Announcement {
        channel: ctx.config.channel.clone(),
        text: format!("*Fishbowl topics, vote in the app home!*\n{bullets}"),
    })
}

pub async fn past_subjects(ctx: &ApiContext) -> Vec<String> {
    ctx.with_store(|store| store.past_subjects().to_vec()).await
}

fn ensure_admin(ctx: &ApiContext, user: &UserId) -> Result<(), ApiError> {
    if ctx.config.is_admin(user) {
        Ok(())
    } else {
        Err(ApiError::new(ErrorCode::Forbidden, "admin only"))
    }
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotLive(id) => {
            ApiError::new(ErrorCode::NotFound, format!("subject {id} no longer exists"))
        }
        other => {
            error!(error = %other, "store operation failed; state was not committed");
            ApiError::new(ErrorCode::Internal, other.to_string())
        }
    }
}
