//! Row → model conversion. Corrupt ids and timestamps are logged and
//! replaced with defaults rather than failing the whole listing.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use parley_db::models::{MessageRow, ThreadRow, UserRow};
use parley_types::models::{Message, Thread, UserRef};

use crate::error::{CoreError, CoreResult};

/// Timestamp string as stored. Fixed-width, so lexical order is time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_time(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by the sqlite3 shell use datetime('now'): no timezone, no 'T'.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn user_ref(row: &UserRow) -> UserRef {
    UserRef {
        id: parse_id(&row.id, "user id"),
        username: row.username.clone(),
    }
}

pub(crate) fn thread(row: &ThreadRow, participants: Vec<UserRef>) -> CoreResult<Thread> {
    let count = participants.len();
    let participants: [UserRef; 2] = participants.try_into().map_err(|_| {
        CoreError::Storage(anyhow::anyhow!(
            "thread {} has {} participants, expected 2",
            row.id,
            count
        ))
    })?;

    Ok(Thread {
        id: parse_id(&row.id, "thread id"),
        participants,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    })
}

pub(crate) fn message(row: MessageRow) -> Message {
    Message {
        id: parse_id(&row.id, "message id"),
        thread_id: parse_id(&row.thread_id, "message thread_id"),
        sender: UserRef {
            id: parse_id(&row.sender_id, "message sender_id"),
            username: row.sender_username,
        },
        created_at: parse_time(&row.created_at),
        text: row.text,
        is_read: row.is_read,
    }
}
