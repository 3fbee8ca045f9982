use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use crate::utils::slot_validator::{validate_date_list, validate_date_value, validate_time_list, validate_time_value};

/// Stored lifecycle state of an invite. Expiry is derived from `expires_at`
/// and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Confirmed,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Confirmed => "confirmed",
            InviteStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "confirmed" => Ok(InviteStatus::Confirmed),
            "declined" => Ok(InviteStatus::Declined),
            other => Err(format!("unknown invite status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetupInvite {
    pub id: Uuid,
    pub token: String,
    pub organizer_name: String,
    pub organizer_email: String,
    pub invitee_name: Option<String>,
    pub invitee_email: Option<String>,
    pub cafe_id: String,
    pub available_dates: Vec<String>,
    pub available_times: Vec<String>,
    pub chosen_date: Option<String>,
    pub chosen_time: Option<String>,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub created_by: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MeetupInvite {
    /// True once `now` is strictly past `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Invite as shown on the public `/invite/{token}` page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicInvite {
    pub token: String,
    pub organizer_name: String,
    pub organizer_email: String,
    pub invitee_name: Option<String>,
    pub cafe_id: String,
    pub available_dates: Vec<String>,
    pub available_times: Vec<String>,
    pub chosen_date: Option<String>,
    pub chosen_time: Option<String>,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
}

impl From<MeetupInvite> for PublicInvite {
    fn from(invite: MeetupInvite) -> Self {
        Self {
            token: invite.token,
            organizer_name: invite.organizer_name,
            organizer_email: invite.organizer_email,
            invitee_name: invite.invitee_name,
            cafe_id: invite.cafe_id,
            available_dates: invite.available_dates,
            available_times: invite.available_times,
            chosen_date: invite.chosen_date,
            chosen_time: invite.chosen_time,
            status: invite.status,
            expires_at: invite.expires_at,
            confirmed_at: invite.confirmed_at,
            declined_at: invite.declined_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    #[validate(length(min = 2, max = 50, message = "The organizer name must be between 2 and 50 characters long"))]
    pub organizer_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub organizer_email: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "Cafe id is too long"))]
    pub cafe_id: String,
    #[validate(length(min = 1, max = 30, message = "Between 1 and 30 dates are required"))]
    #[validate(custom = "validate_date_list")]
    pub dates: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 30, message = "At most 30 times may be proposed"))]
    #[validate(custom = "validate_time_list")]
    pub times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteResponse {
    pub id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub invite_url: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1, max = 50, message = "The invitee name must be between 1 and 50 characters long"))]
    pub invitee_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub invitee_email: String,
    #[validate(custom = "validate_date_value")]
    pub chosen_date: String,
    #[validate(custom = "validate_time_value")]
    pub chosen_time: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeclineInviteRequest {
    #[validate(length(min = 1, max = 50, message = "The invitee name must be between 1 and 50 characters long"))]
    pub invitee_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub invitee_email: String,
    #[validate(length(max = 500, message = "The reason must be at most 500 characters long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub status: InviteStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineInviteResponse {
    pub status: InviteStatus,
    pub declined_at: Option<DateTime<Utc>>,
}

/// Owner-side edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvitePatch {
    #[validate(length(min = 2, max = 50, message = "The organizer name must be between 2 and 50 characters long"))]
    pub organizer_name: Option<String>,
    #[validate(length(min = 1, max = 30, message = "Between 1 and 30 dates are required"))]
    #[validate(custom = "validate_date_list")]
    pub available_dates: Option<Vec<String>>,
    #[validate(length(max = 30, message = "At most 30 times may be proposed"))]
    #[validate(custom = "validate_time_list")]
    pub available_times: Option<Vec<String>>,
}

impl InvitePatch {
    pub fn is_empty(&self) -> bool {
        self.organizer_name.is_none() && self.available_dates.is_none() && self.available_times.is_none()
    }
}

/// The single terminal write an invitee can perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Confirm {
        invitee_name: String,
        invitee_email: String,
        chosen_date: String,
        chosen_time: String,
    },
    Decline {
        invitee_name: String,
        invitee_email: String,
        reason: Option<String>,
    },
}

impl Transition {
    pub fn target(&self) -> InviteStatus {
        match self {
            Transition::Confirm { .. } => InviteStatus::Confirmed,
            Transition::Decline { .. } => InviteStatus::Declined,
        }
    }
}

/// Field-level differences produced by an edit, used for the invitee mail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsDiff {
    pub organizer_name: Option<(String, String)>,
    pub available_dates: Option<(Vec<String>, Vec<String>)>,
    pub available_times: Option<(Vec<String>, Vec<String>)>,
}

impl DetailsDiff {
    pub fn between(before: &MeetupInvite, after: &MeetupInvite) -> Self {
        let changed = |a: &String, b: &String| (a != b).then(|| (a.clone(), b.clone()));
        let changed_list = |a: &Vec<String>, b: &Vec<String>| (a != b).then(|| (a.clone(), b.clone()));

        Self {
            organizer_name: changed(&before.organizer_name, &after.organizer_name),
            available_dates: changed_list(&before.available_dates, &after.available_dates),
            available_times: changed_list(&before.available_times, &after.available_times),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.organizer_name.is_none() && self.available_dates.is_none() && self.available_times.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> MeetupInvite {
        let now = Utc::now();
        MeetupInvite {
            id: Uuid::new_v4(),
            token: "t".repeat(32),
            organizer_name: "Ana".into(),
            organizer_email: "ana@example.com".into(),
            invitee_name: None,
            invitee_email: None,
            cafe_id: String::new(),
            available_dates: vec!["2025-06-01".into()],
            available_times: vec![],
            chosen_date: None,
            chosen_time: None,
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(7),
            confirmed_at: None,
            declined_at: None,
            decline_reason: None,
            created_by: "ana@example.com".into(),
            deleted_at: None,
        }
    }

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [InviteStatus::Pending, InviteStatus::Confirmed, InviteStatus::Declined] {
            assert_eq!(status.as_str().parse::<InviteStatus>().unwrap(), status);
        }
        assert!("expired".parse::<InviteStatus>().is_err());
    }

    #[test]
    fn expiry_is_strict() {
        let invite = sample();
        assert!(!invite.is_expired(invite.expires_at));
        assert!(invite.is_expired(invite.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn diff_reports_only_changed_fields() {
        let before = sample();
        let mut after = before.clone();
        after.available_times = vec!["10:00".into()];

        let diff = DetailsDiff::between(&before, &after);
        assert!(diff.organizer_name.is_none());
        assert!(diff.available_dates.is_none());
        assert_eq!(diff.available_times, Some((vec![], vec!["10:00".to_string()])));
        assert!(DetailsDiff::between(&before, &before).is_empty());
    }

    #[test]
    fn create_request_rejects_bad_slots() {
        let request = CreateInviteRequest {
            organizer_name: "Ana".into(),
            organizer_email: "ana@example.com".into(),
            cafe_id: String::new(),
            dates: vec!["2025-02-30".into()],
            times: vec!["9am".into()],
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("dates"));
        assert!(fields.contains_key("times"));
    }

    #[test]
    fn slot_lists_have_an_upper_bound() {
        let request = CreateInviteRequest {
            organizer_name: "Ana".into(),
            organizer_email: "ana@example.com".into(),
            cafe_id: String::new(),
            dates: (1..=31).map(|d| format!("2025-07-{:02}", d)).collect(),
            times: vec!["09:00".into()],
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("dates"));

        let patch = InvitePatch {
            available_times: Some((0..31).map(|m| format!("10:{:02}", m)).collect()),
            ..InvitePatch::default()
        };
        assert!(patch.validate().unwrap_err().field_errors().contains_key("available_times"));
    }

    #[test]
    fn public_view_hides_internal_fields() {
        let json = serde_json::to_value(PublicInvite::from(sample())).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("createdBy").is_none());
        assert_eq!(json["status"], "pending");
    }
}
