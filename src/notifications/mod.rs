//! Outbound mail for invite lifecycle events.
//!
//! Lifecycle operations only *enqueue* a [`NotificationEvent`] once their
//! state change is stored. A [`worker::NotificationWorker`] drains the queue,
//! renders mails and delivers them through an [`EmailProvider`] with its own
//! retry policy, so a failing mail relay never affects an invite transition.

pub mod smtp;
pub mod templates;
pub mod worker;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use crate::models::invite::{DetailsDiff, MeetupInvite};

pub use templates::EmailContent;

/// Email sending error
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, content: &EmailContent) -> Result<(), EmailError>;
}

/// Provider used when no SMTP relay is configured; mails only reach the log.
pub struct LogProvider;

#[async_trait]
impl EmailProvider for LogProvider {
    async fn send(&self, to: &str, content: &EmailContent) -> Result<(), EmailError> {
        info!(to, subject = %content.subject, "email (log provider)");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    InviteCreated { invite: MeetupInvite, invite_url: String },
    InviteConfirmed { invite: MeetupInvite },
    InviteDeclined { invite: MeetupInvite },
    DetailsChanged { invite: MeetupInvite, diff: DetailsDiff },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::InviteCreated { .. } => "invite_created",
            NotificationEvent::InviteConfirmed { .. } => "invite_confirmed",
            NotificationEvent::InviteDeclined { .. } => "invite_declined",
            NotificationEvent::DetailsChanged { .. } => "details_changed",
        }
    }

    pub fn invite(&self) -> &MeetupInvite {
        match self {
            NotificationEvent::InviteCreated { invite, .. }
            | NotificationEvent::InviteConfirmed { invite }
            | NotificationEvent::InviteDeclined { invite }
            | NotificationEvent::DetailsChanged { invite, .. } => invite,
        }
    }
}

/// Producer half of the notification queue.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never blocks and never fails: a full or closed queue drops the event.
    pub fn enqueue(&self, event: NotificationEvent) {
        let kind = event.kind();
        let invite_id = event.invite().id;
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(kind, %invite_id, "notification queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(kind, %invite_id, "notification worker gone, dropping event");
            }
        }
    }
}
