use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        invite::{
            AcceptInviteRequest, CreateInviteRequest, DeclineInviteRequest, DetailsDiff, InvitePatch, InviteStatus,
            MeetupInvite, Transition,
        },
        user::CallerIdentity,
    },
    notifications::{NotificationEvent, Notifier},
    repositories::invitation_repository::{InviteRepository, StoreError},
    services::{
        clock::Clock,
        rate_limiter::{RateDecision, RateLimiter},
        token::{generate_invite_token, redact},
    },
};

const TOKEN_ATTEMPTS: usize = 3;

/// Business-rule failures of the invite lifecycle
#[derive(Error, Debug)]
pub enum InviteError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invite not found")]
    NotFound,

    #[error("This invite has expired")]
    Expired,

    #[error("Someone already accepted this invite")]
    AlreadyConfirmed,

    #[error("Someone already declined this invite")]
    AlreadyDeclined,

    #[error("Only the organizer can change this invite")]
    Forbidden,

    #[error("Too many invites created, retry in {} seconds", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: StdDuration },

    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
}

impl From<validator::ValidationErrors> for InviteError {
    fn from(errors: validator::ValidationErrors) -> Self {
        InviteError::InvalidInput(errors.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct InviteSettings {
    pub ttl: Duration,
    pub public_base_url: String,
    pub create_limit: u32,
    pub create_window: StdDuration,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            public_base_url: "http://localhost:3000".to_string(),
            create_limit: 5,
            create_window: StdDuration::from_secs(60),
        }
    }
}

/// Owns the invite state machine.
///
/// Every operation re-reads the stored record; terminal transitions and edits
/// go through the repository's conditional writes, so concurrent callers are
/// serialized per invite by the store rather than by this service.
pub struct InviteService {
    repo: Arc<dyn InviteRepository>,
    notifier: Notifier,
    limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
    settings: InviteSettings,
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn trimmed_list(values: &[String]) -> Vec<String> {
    values.iter().map(|v| trimmed(v)).collect()
}

/// Conflict naming whoever already acted on the invite.
fn conflict(status: InviteStatus) -> Option<InviteError> {
    match status {
        InviteStatus::Pending => None,
        InviteStatus::Confirmed => Some(InviteError::AlreadyConfirmed),
        InviteStatus::Declined => Some(InviteError::AlreadyDeclined),
    }
}

impl InviteService {
    pub fn new(
        repo: Arc<dyn InviteRepository>,
        notifier: Notifier,
        limiter: Arc<dyn RateLimiter>,
        clock: Arc<dyn Clock>,
        settings: InviteSettings,
    ) -> Self {
        Self {
            repo,
            notifier,
            limiter,
            clock,
            settings,
        }
    }

    pub fn invite_url(&self, token: &str) -> String {
        format!("{}/invite/{}", self.settings.public_base_url.trim_end_matches('/'), token)
    }

    pub async fn create_invite(
        &self,
        client_key: &str,
        caller: Option<&CallerIdentity>,
        request: CreateInviteRequest,
    ) -> Result<MeetupInvite, InviteError> {
        if let RateDecision::Deny { retry_after } =
            self.limiter
                .check(client_key, self.settings.create_limit, self.settings.create_window)
        {
            info!(client_key, "invite creation rate limited");
            return Err(InviteError::RateLimited { retry_after });
        }

        let request = CreateInviteRequest {
            organizer_name: trimmed(&request.organizer_name),
            organizer_email: email(&request.organizer_email),
            cafe_id: trimmed(&request.cafe_id),
            dates: trimmed_list(&request.dates),
            times: trimmed_list(&request.times),
        };
        request.validate()?;

        let now = self.clock.now();
        let created_by = caller
            .map(|c| c.id.clone())
            .unwrap_or_else(|| request.organizer_email.clone());
        let mut invite = MeetupInvite {
            id: Uuid::new_v4(),
            token: generate_invite_token(),
            organizer_name: request.organizer_name,
            organizer_email: request.organizer_email,
            invitee_name: None,
            invitee_email: None,
            cafe_id: request.cafe_id,
            available_dates: request.dates,
            available_times: request.times,
            chosen_date: None,
            chosen_time: None,
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + self.settings.ttl,
            confirmed_at: None,
            declined_at: None,
            decline_reason: None,
            created_by,
            deleted_at: None,
        };

        let mut attempt = 1;
        loop {
            match self.repo.insert(&invite).await {
                Ok(()) => break,
                Err(StoreError::DuplicateToken) if attempt < TOKEN_ATTEMPTS => {
                    warn!(attempt, "invite token collision, regenerating");
                    invite.token = generate_invite_token();
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(invite_id = %invite.id, token = redact(&invite.token), "invite created");
        self.notifier.enqueue(NotificationEvent::InviteCreated {
            invite: invite.clone(),
            invite_url: self.invite_url(&invite.token),
        });
        Ok(invite)
    }

    pub async fn lookup_invite(&self, token: &str) -> Result<MeetupInvite, InviteError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(InviteError::InvalidInput("token must not be empty".to_string()));
        }

        let invite = self.repo.find_active_by_token(token).await?.ok_or(InviteError::NotFound)?;
        if invite.is_expired(self.clock.now()) {
            return Err(InviteError::Expired);
        }
        Ok(invite)
    }

    pub async fn accept_invite(&self, token: &str, request: AcceptInviteRequest) -> Result<MeetupInvite, InviteError> {
        let request = AcceptInviteRequest {
            invitee_name: trimmed(&request.invitee_name),
            invitee_email: email(&request.invitee_email),
            chosen_date: trimmed(&request.chosen_date),
            chosen_time: trimmed(&request.chosen_time),
        };
        request.validate()?;

        let current = self.actionable(token).await?;
        if !current.available_dates.contains(&request.chosen_date) {
            return Err(InviteError::InvalidInput(format!(
                "chosen date {} is not one of the proposed dates",
                request.chosen_date
            )));
        }

        let transition = Transition::Confirm {
            invitee_name: request.invitee_name,
            invitee_email: request.invitee_email,
            chosen_date: request.chosen_date,
            chosen_time: request.chosen_time,
        };
        let invite = self.apply(token, transition).await?;

        self.notifier.enqueue(NotificationEvent::InviteConfirmed { invite: invite.clone() });
        Ok(invite)
    }

    pub async fn decline_invite(
        &self,
        token: &str,
        request: DeclineInviteRequest,
    ) -> Result<MeetupInvite, InviteError> {
        let request = DeclineInviteRequest {
            invitee_name: trimmed(&request.invitee_name),
            invitee_email: email(&request.invitee_email),
            reason: request.reason.map(|r| trimmed(&r)).filter(|r| !r.is_empty()),
        };
        request.validate()?;

        self.actionable(token).await?;

        let transition = Transition::Decline {
            invitee_name: request.invitee_name,
            invitee_email: request.invitee_email,
            reason: request.reason,
        };
        let invite = self.apply(token, transition).await?;

        self.notifier.enqueue(NotificationEvent::InviteDeclined { invite: invite.clone() });
        Ok(invite)
    }

    pub async fn edit_invite(
        &self,
        id: Uuid,
        caller: &CallerIdentity,
        patch: InvitePatch,
    ) -> Result<MeetupInvite, InviteError> {
        let current = self.owned(id, caller).await?;
        self.check_editable(&current)?;

        let patch = InvitePatch {
            organizer_name: patch.organizer_name.map(|n| trimmed(&n)),
            available_dates: patch.available_dates.map(|d| trimmed_list(&d)),
            available_times: patch.available_times.map(|t| trimmed_list(&t)),
        };
        patch.validate()?;
        if patch.is_empty() {
            return Ok(current);
        }
        if let (Some(chosen), Some(dates)) = (&current.chosen_date, &patch.available_dates) {
            if !dates.contains(chosen) {
                return Err(InviteError::InvalidInput(format!(
                    "the confirmed date {} must stay among the proposed dates",
                    chosen
                )));
            }
        }

        let now = self.clock.now();
        let updated = match self.repo.update_details(id, &caller.id, &patch, now).await? {
            Some(updated) => updated,
            None => {
                // Lost a race against a decline, the expiry, a delete or an
                // accept of a date this patch removes.
                let latest = self.owned(id, caller).await?;
                self.check_editable(&latest)?;
                if let (Some(chosen), Some(dates)) = (&latest.chosen_date, &patch.available_dates) {
                    if !dates.contains(chosen) {
                        return Err(InviteError::AlreadyConfirmed);
                    }
                }
                return Err(InviteError::Internal(StoreError::Corrupt(format!(
                    "conditional update of invite {} matched nothing",
                    id
                ))));
            }
        };

        let diff = DetailsDiff::between(&current, &updated);
        debug!(invite_id = %id, unchanged = diff.is_empty(), "invite edited");
        if !diff.is_empty() && updated.invitee_email.is_some() {
            self.notifier.enqueue(NotificationEvent::DetailsChanged {
                invite: updated.clone(),
                diff,
            });
        }
        Ok(updated)
    }

    pub async fn soft_delete_invite(&self, id: Uuid, caller: &CallerIdentity) -> Result<(), InviteError> {
        self.owned(id, caller).await?;

        if !self.repo.soft_delete(id, &caller.id, self.clock.now()).await? {
            return Err(InviteError::NotFound);
        }
        info!(invite_id = %id, "invite deleted");
        Ok(())
    }

    pub async fn list_own_invites(&self, caller: &CallerIdentity) -> Result<Vec<MeetupInvite>, InviteError> {
        Ok(self.repo.list_active_by_creator(&caller.id).await?)
    }

    /// Confirmed meetups from today (UTC calendar date) on.
    pub async fn list_upcoming(&self, caller: &CallerIdentity) -> Result<Vec<MeetupInvite>, InviteError> {
        let today = self.clock.now().date_naive();
        Ok(self
            .repo
            .list_upcoming(&caller.id, caller.email.as_deref(), today)
            .await?)
    }

    /// Administrative read; soft-deleted invites stay visible here.
    pub async fn admin_get_invite(&self, id: Uuid) -> Result<MeetupInvite, InviteError> {
        self.repo.find_by_id(id).await?.ok_or(InviteError::NotFound)
    }

    /// Removes never-answered invites that expired before `now - retention`.
    pub async fn purge_lapsed(&self, retention: Duration) -> Result<u64, InviteError> {
        let cutoff = self.clock.now() - retention;
        Ok(self.repo.purge_lapsed(cutoff).await?)
    }

    /// Loads an invite an invitee may still act on. Expiry wins over status.
    async fn actionable(&self, token: &str) -> Result<MeetupInvite, InviteError> {
        let invite = self.lookup_invite(token).await?;
        match conflict(invite.status) {
            Some(err) => Err(err),
            None => Ok(invite),
        }
    }

    async fn apply(&self, token: &str, transition: Transition) -> Result<MeetupInvite, InviteError> {
        let target = transition.target();
        let now = self.clock.now();
        match self.repo.transition(token.trim(), &transition, now).await? {
            Some(invite) => {
                info!(invite_id = %invite.id, token = redact(token.trim()), status = %target, "invite answered");
                Ok(invite)
            }
            None => {
                // Someone else got there first; report what they did.
                let latest = self.actionable(token).await?;
                Err(InviteError::Internal(StoreError::Corrupt(format!(
                    "conditional transition of invite {} matched nothing",
                    latest.id
                ))))
            }
        }
    }

    async fn owned(&self, id: Uuid, caller: &CallerIdentity) -> Result<MeetupInvite, InviteError> {
        let invite = self.repo.find_active_by_id(id).await?.ok_or(InviteError::NotFound)?;
        if invite.created_by != caller.id {
            return Err(InviteError::Forbidden);
        }
        Ok(invite)
    }

    /// Pending and confirmed invites stay editable until they expire; a
    /// declined invite is closed.
    fn check_editable(&self, invite: &MeetupInvite) -> Result<(), InviteError> {
        if invite.is_expired(self.clock.now()) {
            return Err(InviteError::Expired);
        }
        match invite.status {
            InviteStatus::Declined => Err(InviteError::AlreadyDeclined),
            InviteStatus::Pending | InviteStatus::Confirmed => Ok(()),
        }
    }
}
