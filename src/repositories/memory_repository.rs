// repositories/memory_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::invitation_repository::{InviteRepository, StoreError};
use crate::models::invite::{InvitePatch, InviteStatus, MeetupInvite, Transition};
use crate::utils::slot_validator::SlotValidator;

#[derive(Default)]
struct Tables {
    invites: HashMap<Uuid, MeetupInvite>,
    by_token: HashMap<String, Uuid>,
}

/// Single-process invite store. Each conditional write runs entirely under
/// one lock, which gives the same per-token serialization as the
/// `WHERE status = 'pending'` updates of the Postgres store.
#[derive(Default)]
pub struct MemoryInviteRepository {
    tables: Mutex<Tables>,
}

impl MemoryInviteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half-applied write:
        // every mutation below is a single assignment of a finished value.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn actionable(invite: &MeetupInvite, now: DateTime<Utc>) -> bool {
        invite.status == InviteStatus::Pending && !invite.is_deleted() && !invite.is_expired(now)
    }
}

#[async_trait]
impl InviteRepository for MemoryInviteRepository {
    async fn insert(&self, invite: &MeetupInvite) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.by_token.contains_key(&invite.token) {
            return Err(StoreError::DuplicateToken);
        }
        tables.by_token.insert(invite.token.clone(), invite.id);
        tables.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find_active_by_token(&self, token: &str) -> Result<Option<MeetupInvite>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .by_token
            .get(token)
            .and_then(|id| tables.invites.get(id))
            .filter(|invite| !invite.is_deleted())
            .cloned())
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError> {
        let tables = self.lock();
        Ok(tables.invites.get(&id).filter(|invite| !invite.is_deleted()).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError> {
        Ok(self.lock().invites.get(&id).cloned())
    }

    async fn list_active_by_creator(&self, created_by: &str) -> Result<Vec<MeetupInvite>, StoreError> {
        let tables = self.lock();
        let mut invites: Vec<MeetupInvite> = tables
            .invites
            .values()
            .filter(|invite| invite.created_by == created_by && !invite.is_deleted())
            .cloned()
            .collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn list_upcoming(
        &self,
        created_by: &str,
        invitee_email: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<MeetupInvite>, StoreError> {
        let tables = self.lock();
        let mut invites: Vec<MeetupInvite> = tables
            .invites
            .values()
            .filter(|invite| invite.status == InviteStatus::Confirmed && !invite.is_deleted())
            .filter(|invite| {
                invite.created_by == created_by
                    || (invitee_email.is_some() && invite.invitee_email.as_deref() == invitee_email)
            })
            .filter(|invite| {
                invite
                    .chosen_date
                    .as_deref()
                    .and_then(|date| SlotValidator::check_date(date).ok())
                    .map_or(false, |date| date >= today)
            })
            .cloned()
            .collect();
        invites.sort_by(|a, b| (&a.chosen_date, &a.chosen_time).cmp(&(&b.chosen_date, &b.chosen_time)));
        Ok(invites)
    }

    async fn transition(
        &self,
        token: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError> {
        let mut tables = self.lock();
        let Some(id) = tables.by_token.get(token).copied() else {
            return Ok(None);
        };
        let Some(invite) = tables.invites.get_mut(&id) else {
            return Ok(None);
        };
        if !Self::actionable(invite, now) {
            return Ok(None);
        }

        let mut updated = invite.clone();
        match transition {
            Transition::Confirm {
                invitee_name,
                invitee_email,
                chosen_date,
                chosen_time,
            } => {
                updated.status = InviteStatus::Confirmed;
                updated.invitee_name = Some(invitee_name.clone());
                updated.invitee_email = Some(invitee_email.clone());
                updated.chosen_date = Some(chosen_date.clone());
                updated.chosen_time = Some(chosen_time.clone());
                updated.confirmed_at = Some(now);
            }
            Transition::Decline {
                invitee_name,
                invitee_email,
                reason,
            } => {
                updated.status = InviteStatus::Declined;
                updated.invitee_name = Some(invitee_name.clone());
                updated.invitee_email = Some(invitee_email.clone());
                updated.decline_reason = reason.clone();
                updated.declined_at = Some(now);
            }
        }
        *invite = updated.clone();
        Ok(Some(updated))
    }

    async fn update_details(
        &self,
        id: Uuid,
        created_by: &str,
        patch: &InvitePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError> {
        let mut tables = self.lock();
        let Some(invite) = tables.invites.get_mut(&id) else {
            return Ok(None);
        };
        let open = matches!(invite.status, InviteStatus::Pending | InviteStatus::Confirmed)
            && !invite.is_deleted()
            && !invite.is_expired(now);
        let keeps_choice = match (&invite.chosen_date, &patch.available_dates) {
            (Some(chosen), Some(dates)) => dates.contains(chosen),
            _ => true,
        };
        if invite.created_by != created_by || !open || !keeps_choice {
            return Ok(None);
        }

        let mut updated = invite.clone();
        if let Some(name) = &patch.organizer_name {
            updated.organizer_name = name.clone();
        }
        if let Some(dates) = &patch.available_dates {
            updated.available_dates = dates.clone();
        }
        if let Some(times) = &patch.available_times {
            updated.available_times = times.clone();
        }
        *invite = updated.clone();
        Ok(Some(updated))
    }

    async fn soft_delete(&self, id: Uuid, created_by: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        match tables.invites.get_mut(&id) {
            Some(invite) if invite.created_by == created_by && !invite.is_deleted() => {
                invite.deleted_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_lapsed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let lapsed: Vec<(Uuid, String)> = tables
            .invites
            .values()
            .filter(|i| i.status == InviteStatus::Pending && !i.is_deleted() && i.expires_at < cutoff)
            .map(|i| (i.id, i.token.clone()))
            .collect();
        for (id, token) in &lapsed {
            tables.invites.remove(id);
            tables.by_token.remove(token);
        }
        Ok(lapsed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(token: &str, created_by: &str, now: DateTime<Utc>) -> MeetupInvite {
        MeetupInvite {
            id: Uuid::new_v4(),
            token: token.to_string(),
            organizer_name: "Ana".into(),
            organizer_email: "ana@example.com".into(),
            invitee_name: None,
            invitee_email: None,
            cafe_id: "cafe-1".into(),
            available_dates: vec!["2025-06-01".into()],
            available_times: vec!["09:00".into()],
            chosen_date: None,
            chosen_time: None,
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(7),
            confirmed_at: None,
            declined_at: None,
            decline_reason: None,
            created_by: created_by.to_string(),
            deleted_at: None,
        }
    }

    fn confirm() -> Transition {
        Transition::Confirm {
            invitee_name: "Bo".into(),
            invitee_email: "bo@example.com".into(),
            chosen_date: "2025-06-01".into(),
            chosen_time: "09:00".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        repo.insert(&invite("abc", "ana", now)).await.unwrap();
        let err = repo.insert(&invite("abc", "ana", now)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateToken));
    }

    #[tokio::test]
    async fn transition_applies_once() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        repo.insert(&invite("abc", "ana", now)).await.unwrap();

        let first = repo.transition("abc", &confirm(), now).await.unwrap();
        assert_eq!(first.unwrap().status, InviteStatus::Confirmed);

        let decline = Transition::Decline {
            invitee_name: "Cy".into(),
            invitee_email: "cy@example.com".into(),
            reason: None,
        };
        assert!(repo.transition("abc", &decline, now).await.unwrap().is_none());
        let stored = repo.find_active_by_token("abc").await.unwrap().unwrap();
        assert_eq!(stored.invitee_name.as_deref(), Some("Bo"));
    }

    #[tokio::test]
    async fn transition_refuses_expired_and_deleted() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        let expired = invite("old", "ana", now - Duration::days(8));
        repo.insert(&expired).await.unwrap();
        assert!(repo.transition("old", &confirm(), now).await.unwrap().is_none());

        let live = invite("live", "ana", now);
        repo.insert(&live).await.unwrap();
        assert!(repo.soft_delete(live.id, "ana", now).await.unwrap());
        assert!(repo.transition("live", &confirm(), now).await.unwrap().is_none());
        assert!(repo.find_active_by_token("live").await.unwrap().is_none());
        assert!(repo.find_by_id(live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn details_update_follows_the_edit_guard() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        let record = invite("abc", "ana", now);
        repo.insert(&record).await.unwrap();
        repo.transition("abc", &confirm(), now).await.unwrap();

        let rename = InvitePatch {
            organizer_name: Some("Ana B".into()),
            ..InvitePatch::default()
        };
        let updated = repo.update_details(record.id, "ana", &rename, now).await.unwrap().unwrap();
        assert_eq!(updated.organizer_name, "Ana B");
        assert_eq!(updated.status, InviteStatus::Confirmed);

        let drops_choice = InvitePatch {
            available_dates: Some(vec!["2025-06-05".into()]),
            ..InvitePatch::default()
        };
        assert!(repo
            .update_details(record.id, "ana", &drops_choice, now)
            .await
            .unwrap()
            .is_none());
        assert!(repo.update_details(record.id, "eve", &rename, now).await.unwrap().is_none());

        let declined = invite("dec", "ana", now);
        repo.insert(&declined).await.unwrap();
        let decline = Transition::Decline {
            invitee_name: "Cy".into(),
            invitee_email: "cy@example.com".into(),
            reason: None,
        };
        repo.transition("dec", &decline, now).await.unwrap();
        assert!(repo.update_details(declined.id, "ana", &rename, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn soft_delete_checks_owner() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        let record = invite("abc", "ana", now);
        repo.insert(&record).await.unwrap();
        assert!(!repo.soft_delete(record.id, "mallory", now).await.unwrap());
        assert!(repo.soft_delete(record.id, "ana", now).await.unwrap());
        assert!(!repo.soft_delete(record.id, "ana", now).await.unwrap());
    }

    #[tokio::test]
    async fn purge_skips_answered_and_deleted() {
        let repo = MemoryInviteRepository::new();
        let now = Utc::now();
        let long_ago = now - Duration::days(60);

        let lapsed = invite("lapsed", "ana", long_ago);
        let answered = invite("answered", "ana", long_ago);
        let deleted = invite("deleted", "ana", long_ago);
        for record in [&lapsed, &answered, &deleted] {
            repo.insert(record).await.unwrap();
        }
        repo.transition("answered", &confirm(), long_ago).await.unwrap();
        repo.soft_delete(deleted.id, "ana", long_ago).await.unwrap();

        assert_eq!(repo.purge_lapsed(now - Duration::days(30)).await.unwrap(), 1);
        assert!(repo.find_by_id(lapsed.id).await.unwrap().is_none());
        assert!(repo.find_by_id(answered.id).await.unwrap().is_some());
        assert!(repo.find_by_id(deleted.id).await.unwrap().is_some());
    }
}
