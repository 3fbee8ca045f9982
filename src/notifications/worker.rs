use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    templates::{self, OutgoingMail},
    EmailError, EmailProvider, NotificationEvent,
};
use crate::models::cafe::Cafe;
use crate::repositories::cafe_repository::CafeDirectory;

/// Exponential backoff between delivery attempts of a single mail.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, `attempt` counting from 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

pub struct NotificationWorker {
    provider: Arc<dyn EmailProvider>,
    cafes: Arc<dyn CafeDirectory>,
    policy: RetryPolicy,
}

impl NotificationWorker {
    pub fn new(provider: Arc<dyn EmailProvider>, cafes: Arc<dyn CafeDirectory>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            cafes,
            policy,
        }
    }

    pub fn spawn(self, rx: mpsc::Receiver<NotificationEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Drains the queue until every [`super::Notifier`] is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("notification queue closed, worker stopping");
    }

    /// Renders and delivers one event; returns how many mails went out.
    pub async fn handle(&self, event: NotificationEvent) -> usize {
        let kind = event.kind();
        let invite_id = event.invite().id;
        let mails = self.render(event).await;

        let mut delivered = 0;
        for mail in &mails {
            match self.deliver(mail).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(kind, %invite_id, to = %mail.to, error = %e, "giving up on notification");
                }
            }
        }
        debug!(kind, %invite_id, delivered, total = mails.len(), "notification handled");
        delivered
    }

    async fn render(&self, event: NotificationEvent) -> Vec<OutgoingMail> {
        match event {
            NotificationEvent::InviteCreated { invite, invite_url } => {
                vec![templates::invite_created(&invite, &invite_url)]
            }
            NotificationEvent::InviteConfirmed { invite } => {
                let cafe = self.venue(&invite.cafe_id).await;
                templates::invite_confirmed(&invite, cafe.as_ref())
            }
            NotificationEvent::InviteDeclined { invite } => vec![templates::invite_declined(&invite)],
            NotificationEvent::DetailsChanged { invite, diff } => {
                templates::details_changed(&invite, &diff).into_iter().collect()
            }
        }
    }

    // Missing venue only degrades the mail.
    async fn venue(&self, cafe_id: &str) -> Option<Cafe> {
        if cafe_id.is_empty() {
            return None;
        }
        match self.cafes.find(cafe_id).await {
            Ok(cafe) => cafe,
            Err(e) => {
                warn!(cafe_id, error = %e, "venue lookup failed, sending mail without it");
                None
            }
        }
    }

    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), EmailError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.send(&mail.to, &mail.content).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(to = %mail.to, attempt, error = %e, ?delay, "email send failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
