// repositories/invitation_repository.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::{Client, Pool, PoolError};
use thiserror::Error;
use tokio_postgres::{error::SqlState, Row};
use uuid::Uuid;

use crate::models::invite::{InvitePatch, InviteStatus, MeetupInvite, Transition};

/// Storage failures unrelated to business rules
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to get client from pool: {0}")]
    Pool(#[from] PoolError),

    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Invite token already exists")]
    DuplicateToken,

    #[error("Corrupt invite row: {0}")]
    Corrupt(String),
}

/// Persistence seam for the invite lifecycle.
///
/// Every `find_active_*`/`list_*` method excludes soft-deleted rows. The
/// conditional writes (`transition`, `update_details`, `soft_delete`) must be
/// atomic: they either apply completely to a row still matching their guard
/// or touch nothing and return `None`/`false`.
#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Fails with [`StoreError::DuplicateToken`] when the token is taken.
    async fn insert(&self, invite: &MeetupInvite) -> Result<(), StoreError>;

    async fn find_active_by_token(&self, token: &str) -> Result<Option<MeetupInvite>, StoreError>;

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError>;

    /// Administrative lookup, soft-deleted rows included.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError>;

    async fn list_active_by_creator(&self, created_by: &str) -> Result<Vec<MeetupInvite>, StoreError>;

    /// Confirmed invites the caller organizes or attends, from `today` on.
    async fn list_upcoming(
        &self,
        created_by: &str,
        invitee_email: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<MeetupInvite>, StoreError>;

    /// Applies `transition` only while the invite is pending, not deleted and
    /// not expired at `now`.
    async fn transition(
        &self,
        token: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError>;

    /// Applies the provided patch fields to an owned, unexpired, non-deleted
    /// invite that is pending or confirmed. A confirmed invite only matches
    /// while its chosen date stays among the patched dates.
    async fn update_details(
        &self,
        id: Uuid,
        created_by: &str,
        patch: &InvitePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError>;

    async fn soft_delete(&self, id: Uuid, created_by: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Hard-deletes never-answered invites whose expiry is before `cutoff`.
    async fn purge_lapsed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

const INVITE_COLUMNS: &str = "id, token, organizer_name, organizer_email, invitee_name, invitee_email, \
     cafe_id, available_dates, available_times, chosen_date, chosen_time, status, created_at, \
     expires_at, confirmed_at, declined_at, decline_reason, created_by, deleted_at";

fn row_to_invite(row: &Row) -> Result<MeetupInvite, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(MeetupInvite {
        id: row.try_get("id")?,
        token: row.try_get("token")?,
        organizer_name: row.try_get("organizer_name")?,
        organizer_email: row.try_get("organizer_email")?,
        invitee_name: row.try_get("invitee_name")?,
        invitee_email: row.try_get("invitee_email")?,
        cafe_id: row.try_get("cafe_id")?,
        available_dates: row.try_get("available_dates")?,
        available_times: row.try_get("available_times")?,
        chosen_date: row.try_get("chosen_date")?,
        chosen_time: row.try_get("chosen_time")?,
        status: status.parse::<InviteStatus>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        confirmed_at: row.try_get("confirmed_at")?,
        declined_at: row.try_get("declined_at")?,
        decline_reason: row.try_get("decline_reason")?,
        created_by: row.try_get("created_by")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn rows_to_invites(rows: &[Row]) -> Result<Vec<MeetupInvite>, StoreError> {
    rows.iter().map(row_to_invite).collect()
}

pub struct PgInviteRepository {
    pool: Pool,
}

impl PgInviteRepository {
    pub fn new(pool: Pool) -> Self {
        PgInviteRepository { pool }
    }

    async fn client(&self) -> Result<Client, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl InviteRepository for PgInviteRepository {
    async fn insert(&self, invite: &MeetupInvite) -> Result<(), StoreError> {
        let query = "
            INSERT INTO meetup_invites
                (id, token, organizer_name, organizer_email, cafe_id, available_dates,
                 available_times, status, created_at, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ";

        let client = self.client().await?;
        let result = client
            .execute(
                query,
                &[
                    &invite.id,
                    &invite.token,
                    &invite.organizer_name,
                    &invite.organizer_email,
                    &invite.cafe_id,
                    &invite.available_dates,
                    &invite.available_times,
                    &invite.status.as_str(),
                    &invite.created_at,
                    &invite.expires_at,
                    &invite.created_by,
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Err(StoreError::DuplicateToken),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_active_by_token(&self, token: &str) -> Result<Option<MeetupInvite>, StoreError> {
        let query = format!(
            "SELECT {} FROM meetup_invites WHERE token = $1 AND deleted_at IS NULL",
            INVITE_COLUMNS
        );
        let client = self.client().await?;
        let row = client.query_opt(query.as_str(), &[&token]).await?;
        row.as_ref().map(row_to_invite).transpose()
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError> {
        let query = format!(
            "SELECT {} FROM meetup_invites WHERE id = $1 AND deleted_at IS NULL",
            INVITE_COLUMNS
        );
        let client = self.client().await?;
        let row = client.query_opt(query.as_str(), &[&id]).await?;
        row.as_ref().map(row_to_invite).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetupInvite>, StoreError> {
        let query = format!("SELECT {} FROM meetup_invites WHERE id = $1", INVITE_COLUMNS);
        let client = self.client().await?;
        let row = client.query_opt(query.as_str(), &[&id]).await?;
        row.as_ref().map(row_to_invite).transpose()
    }

    async fn list_active_by_creator(&self, created_by: &str) -> Result<Vec<MeetupInvite>, StoreError> {
        let query = format!(
            "SELECT {} FROM meetup_invites
             WHERE created_by = $1 AND deleted_at IS NULL
             ORDER BY created_at DESC",
            INVITE_COLUMNS
        );
        let client = self.client().await?;
        let rows = client.query(query.as_str(), &[&created_by]).await?;
        rows_to_invites(&rows)
    }

    async fn list_upcoming(
        &self,
        created_by: &str,
        invitee_email: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<MeetupInvite>, StoreError> {
        // chosen_date is validated ISO-8601, so text order is calendar order.
        let query = format!(
            "SELECT {} FROM meetup_invites
             WHERE status = 'confirmed' AND deleted_at IS NULL
               AND (created_by = $1 OR ($2::TEXT IS NOT NULL AND invitee_email = $2))
               AND chosen_date >= $3
             ORDER BY chosen_date, chosen_time",
            INVITE_COLUMNS
        );
        let today = today.format("%Y-%m-%d").to_string();
        let client = self.client().await?;
        let rows = client
            .query(query.as_str(), &[&created_by, &invitee_email, &today])
            .await?;
        rows_to_invites(&rows)
    }

    async fn transition(
        &self,
        token: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError> {
        let client = self.client().await?;
        let row = match transition {
            Transition::Confirm {
                invitee_name,
                invitee_email,
                chosen_date,
                chosen_time,
            } => {
                let query = format!(
                    "UPDATE meetup_invites
                     SET status = 'confirmed', invitee_name = $2, invitee_email = $3,
                         chosen_date = $4, chosen_time = $5, confirmed_at = $6
                     WHERE token = $1 AND status = 'pending' AND deleted_at IS NULL AND expires_at >= $6
                     RETURNING {}",
                    INVITE_COLUMNS
                );
                client
                    .query_opt(
                        query.as_str(),
                        &[&token, invitee_name, invitee_email, chosen_date, chosen_time, &now],
                    )
                    .await?
            }
            Transition::Decline {
                invitee_name,
                invitee_email,
                reason,
            } => {
                let query = format!(
                    "UPDATE meetup_invites
                     SET status = 'declined', invitee_name = $2, invitee_email = $3,
                         decline_reason = $4, declined_at = $5
                     WHERE token = $1 AND status = 'pending' AND deleted_at IS NULL AND expires_at >= $5
                     RETURNING {}",
                    INVITE_COLUMNS
                );
                client
                    .query_opt(query.as_str(), &[&token, invitee_name, invitee_email, reason, &now])
                    .await?
            }
        };

        row.as_ref().map(row_to_invite).transpose()
    }

    async fn update_details(
        &self,
        id: Uuid,
        created_by: &str,
        patch: &InvitePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetupInvite>, StoreError> {
        let query = format!(
            "UPDATE meetup_invites
             SET organizer_name = COALESCE($3, organizer_name),
                 available_dates = COALESCE($4, available_dates),
                 available_times = COALESCE($5, available_times)
             WHERE id = $1 AND created_by = $2 AND status IN ('pending', 'confirmed')
               AND deleted_at IS NULL AND expires_at >= $6
               AND ($4::TEXT[] IS NULL OR chosen_date IS NULL OR chosen_date = ANY($4))
             RETURNING {}",
            INVITE_COLUMNS
        );
        let client = self.client().await?;
        let row = client
            .query_opt(
                query.as_str(),
                &[
                    &id,
                    &created_by,
                    &patch.organizer_name,
                    &patch.available_dates,
                    &patch.available_times,
                    &now,
                ],
            )
            .await?;
        row.as_ref().map(row_to_invite).transpose()
    }

    async fn soft_delete(&self, id: Uuid, created_by: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let query = "
            UPDATE meetup_invites SET deleted_at = $3
            WHERE id = $1 AND created_by = $2 AND deleted_at IS NULL
        ";
        let client = self.client().await?;
        let updated = client.execute(query, &[&id, &created_by, &now]).await?;
        Ok(updated == 1)
    }

    async fn purge_lapsed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "
            DELETE FROM meetup_invites
            WHERE status = 'pending' AND deleted_at IS NULL AND expires_at < $1
        ";
        let client = self.client().await?;
        Ok(client.execute(query, &[&cutoff]).await?)
    }
}
