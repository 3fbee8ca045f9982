//! Email templates for invite lifecycle mails.

use crate::models::{
    cafe::Cafe,
    invite::{DetailsDiff, MeetupInvite},
};

/// Rendered email, ready for a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl EmailContent {
    fn new(subject: String, text: String) -> Self {
        let html = to_html(&text);
        Self { subject, text, html }
    }
}

/// One mail addressed to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub content: EmailContent,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn to_html(text: &str) -> String {
    let paragraphs: String = text
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; line-height: 1.6; color: #333;">{}</body>
</html>"#,
        paragraphs
    )
}

fn venue_line(cafe: Option<&Cafe>) -> String {
    match cafe {
        Some(cafe) => format!("Where: {}, {} ({})", cafe.name, cafe.address, cafe.city),
        None => "Where: the cafe is still to be decided".to_string(),
    }
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}

pub fn invite_created(invite: &MeetupInvite, invite_url: &str) -> OutgoingMail {
    let text = format!(
        "Hi {}!\n\nYour coffee meetup invite is ready. Share this link with the person you want to meet:\n{}\n\nProposed dates: {}\nProposed times: {}\n\nThe link expires on {}.\n\n--\nAnemi Meets",
        invite.organizer_name,
        invite_url,
        list_or_none(&invite.available_dates),
        list_or_none(&invite.available_times),
        invite.expires_at.format("%Y-%m-%d %H:%M UTC"),
    );
    OutgoingMail {
        to: invite.organizer_email.clone(),
        content: EmailContent::new("Your coffee meetup invite is ready".to_string(), text),
    }
}

/// Confirmation goes to both parties.
pub fn invite_confirmed(invite: &MeetupInvite, cafe: Option<&Cafe>) -> Vec<OutgoingMail> {
    let invitee_name = invite.invitee_name.as_deref().unwrap_or("your guest");
    let date = invite.chosen_date.as_deref().unwrap_or("-");
    let time = invite.chosen_time.as_deref().unwrap_or("-");
    let details = format!("When: {} at {}\n{}", date, time, venue_line(cafe));

    let mut mails = vec![OutgoingMail {
        to: invite.organizer_email.clone(),
        content: EmailContent::new(
            format!("{} accepted your coffee meetup", invitee_name),
            format!(
                "Hi {}!\n\n{} accepted your invite.\n\n{}\n\n--\nAnemi Meets",
                invite.organizer_name, invitee_name, details
            ),
        ),
    }];

    if let Some(invitee_email) = &invite.invitee_email {
        mails.push(OutgoingMail {
            to: invitee_email.clone(),
            content: EmailContent::new(
                format!("Your coffee meetup with {} is confirmed", invite.organizer_name),
                format!(
                    "Hi {}!\n\nYou are meeting {}.\n\n{}\n\n--\nAnemi Meets",
                    invitee_name, invite.organizer_name, details
                ),
            ),
        });
    }
    mails
}

pub fn invite_declined(invite: &MeetupInvite) -> OutgoingMail {
    let invitee_name = invite.invitee_name.as_deref().unwrap_or("Your guest");
    let invitee_email = invite.invitee_email.as_deref().unwrap_or("-");
    let reason = match invite.decline_reason.as_deref() {
        Some(reason) => format!("Reason: {}", reason),
        None => "No reason was given.".to_string(),
    };
    OutgoingMail {
        to: invite.organizer_email.clone(),
        content: EmailContent::new(
            format!("{} declined your coffee meetup", invitee_name),
            format!(
                "Hi {}!\n\n{} ({}) declined your invite.\n\n{}\n\n--\nAnemi Meets",
                invite.organizer_name, invitee_name, invitee_email, reason
            ),
        ),
    }
}

/// `None` when nobody is attached to the invite yet.
pub fn details_changed(invite: &MeetupInvite, diff: &DetailsDiff) -> Option<OutgoingMail> {
    let to = invite.invitee_email.clone()?;

    let mut changes = Vec::new();
    if let Some((before, after)) = &diff.organizer_name {
        changes.push(format!("Organizer: {} -> {}", before, after));
    }
    if let Some((before, after)) = &diff.available_dates {
        changes.push(format!("Dates: {} -> {}", list_or_none(before), list_or_none(after)));
    }
    if let Some((before, after)) = &diff.available_times {
        changes.push(format!("Times: {} -> {}", list_or_none(before), list_or_none(after)));
    }

    Some(OutgoingMail {
        to,
        content: EmailContent::new(
            "Your coffee meetup details changed".to_string(),
            format!(
                "Hi {}!\n\n{} updated the meetup:\n{}\n\n--\nAnemi Meets",
                invite.invitee_name.as_deref().unwrap_or("there"),
                invite.organizer_name,
                changes.join("\n")
            ),
        ),
    })
}
