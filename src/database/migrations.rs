use thiserror::Error;
use tokio_postgres::Client;

#[derive(Error, Debug)]
#[error("{step}: {source}")]
pub struct MigrationError {
    step: &'static str,
    #[source]
    source: tokio_postgres::Error,
}

const STEPS: &[(&str, &str)] = &[
    (
        "create meetup_invites table",
        "
        CREATE TABLE IF NOT EXISTS meetup_invites (
            id UUID PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            organizer_name TEXT NOT NULL,
            organizer_email TEXT NOT NULL,
            invitee_name TEXT,
            invitee_email TEXT,
            cafe_id TEXT NOT NULL DEFAULT '',
            available_dates TEXT[] NOT NULL,
            available_times TEXT[] NOT NULL DEFAULT '{}',
            chosen_date TEXT,
            chosen_time TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'declined')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at TIMESTAMPTZ NOT NULL,
            confirmed_at TIMESTAMPTZ,
            declined_at TIMESTAMPTZ,
            decline_reason TEXT,
            created_by TEXT NOT NULL,
            deleted_at TIMESTAMPTZ
        )
        ",
    ),
    (
        "create created_by index",
        "CREATE INDEX IF NOT EXISTS meetup_invites_created_by_idx ON meetup_invites (created_by)",
    ),
    (
        "create invitee_email index",
        "CREATE INDEX IF NOT EXISTS meetup_invites_invitee_email_idx ON meetup_invites (invitee_email)",
    ),
    (
        "create status/expiry index",
        "CREATE INDEX IF NOT EXISTS meetup_invites_status_expires_idx ON meetup_invites (status, expires_at)",
    ),
    (
        "create cafes table",
        "
        CREATE TABLE IF NOT EXISTS cafes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT ''
        )
        ",
    ),
];

// Creates all the tables and indexes the invite lifecycle needs.
pub async fn apply_migrations(client: &Client) -> Result<(), MigrationError> {
    for &(step, sql) in STEPS {
        client
            .batch_execute(sql)
            .await
            .map_err(|source| MigrationError { step, source })?;
    }
    Ok(())
}
