//! Plain SQL helpers. Everything here takes a `&Connection` so callers can
//! compose several steps inside one `Database::with_tx` closure.

use crate::models::{MessageRow, ParticipantRow, ThreadRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_tx(|conn| insert_user(conn, id, username, email, password_hash, created_at))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_id(conn, id))
    }
}

// -- Users --

const USER_COLUMNS: &str = "id, username, email, password, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    id: &str,
    username: &str,
    email: &str,
    password_hash: &str,
    created_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (id, username, email, password_hash, created_at),
    )?;
    Ok(())
}

pub fn user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    let row = conn.query_row(&sql, [username], user_from_row).optional()?;
    Ok(row)
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let row = conn.query_row(&sql, [id], user_from_row).optional()?;
    Ok(row)
}

/// Batch-fetch users. Ids that do not exist are simply absent from the result.
pub fn users_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<UserRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({}) ORDER BY rowid",
        USER_COLUMNS,
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(as_params(ids).as_slice(), user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Threads --

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok(ThreadRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
    })
}

pub fn insert_thread(conn: &Connection, id: &str, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO threads (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        (id, now),
    )?;
    Ok(())
}

pub fn thread_by_id(conn: &Connection, id: &str) -> Result<Option<ThreadRow>> {
    let row = conn
        .query_row(
            "SELECT id, created_at, updated_at FROM threads WHERE id = ?1",
            [id],
            thread_from_row,
        )
        .optional()?;
    Ok(row)
}

/// The thread whose participant set contains both users, if any.
pub fn find_thread_for_pair(conn: &Connection, user_a: &str, user_b: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT p1.thread_id
             FROM thread_participants p1
             JOIN thread_participants p2 ON p2.thread_id = p1.thread_id
             WHERE p1.user_id = ?1 AND p2.user_id = ?2
             LIMIT 1",
            (user_a, user_b),
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn touch_thread(conn: &Connection, id: &str, now: &str) -> Result<()> {
    conn.execute("UPDATE threads SET updated_at = ?2 WHERE id = ?1", (id, now))?;
    Ok(())
}

/// Deletes the thread; participant links and messages go with it via
/// `ON DELETE CASCADE`. Returns the number of threads removed.
pub fn delete_thread(conn: &Connection, id: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM threads WHERE id = ?1", [id])?;
    Ok(removed)
}

pub fn count_threads_for_user(conn: &Connection, user_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM thread_participants WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Threads the user participates in, most recently updated first.
pub fn threads_for_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<ThreadRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.created_at, t.updated_at
         FROM threads t
         JOIN thread_participants p ON p.thread_id = t.id
         WHERE p.user_id = ?1
         ORDER BY t.updated_at DESC, t.rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, limit, offset], thread_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Participants --

pub fn is_participant(conn: &Connection, thread_id: &str, user_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM thread_participants WHERE thread_id = ?1 AND user_id = ?2)",
        (thread_id, user_id),
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn participant_count(conn: &Connection, thread_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM thread_participants WHERE thread_id = ?1",
        [thread_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

pub fn insert_participant(conn: &Connection, thread_id: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO thread_participants (thread_id, user_id) VALUES (?1, ?2)",
        (thread_id, user_id),
    )?;
    Ok(())
}

/// Participants (with usernames) for a set of threads, in attach order.
pub fn participants_for_threads(conn: &Connection, thread_ids: &[String]) -> Result<Vec<ParticipantRow>> {
    if thread_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT p.thread_id, p.user_id, u.username
         FROM thread_participants p
         JOIN users u ON u.id = p.user_id
         WHERE p.thread_id IN ({})
         ORDER BY p.rowid",
        placeholders(thread_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(as_params(thread_ids).as_slice(), |row| {
            Ok(ParticipantRow {
                thread_id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Messages --

// JOIN users so the sender's username comes back in the same query
const MESSAGE_SELECT: &str = "SELECT m.id, m.thread_id, m.sender_id, u.username, m.text, m.created_at, m.is_read
     FROM messages m
     LEFT JOIN users u ON u.id = m.sender_id";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        text: row.get(4)?,
        created_at: row.get(5)?,
        is_read: row.get(6)?,
    })
}

pub fn insert_message(
    conn: &Connection,
    id: &str,
    thread_id: &str,
    sender_id: &str,
    text: &str,
    created_at: &str,
    is_read: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, thread_id, sender_id, text, created_at, is_read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, thread_id, sender_id, text, created_at, is_read],
    )?;
    Ok(())
}

pub fn message_by_id(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
    let row = conn.query_row(&sql, [id], message_from_row).optional()?;
    Ok(row)
}

/// The message, but only if it lives in a thread `user_id` participates in.
pub fn message_visible_to(conn: &Connection, id: &str, user_id: &str) -> Result<Option<MessageRow>> {
    let sql = format!(
        "{} JOIN thread_participants p ON p.thread_id = m.thread_id AND p.user_id = ?2
         WHERE m.id = ?1",
        MESSAGE_SELECT
    );
    let row = conn.query_row(&sql, (id, user_id), message_from_row).optional()?;
    Ok(row)
}

pub fn count_messages(conn: &Connection, thread_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
        [thread_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Messages of a thread, oldest first.
pub fn messages_for_thread(
    conn: &Connection,
    thread_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "{} WHERE m.thread_id = ?1
         ORDER BY m.created_at ASC, m.rowid ASC
         LIMIT ?2 OFFSET ?3",
        MESSAGE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![thread_id, limit, offset], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Flip `is_read` to true. Only matches unread rows, so the transition is a
/// single atomic statement and never goes backwards. Returns rows changed.
pub fn mark_message_read(conn: &Connection, id: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
        [id],
    )?;
    Ok(changed)
}

/// Unread messages sent by someone else, across every thread of `user_id`.
pub fn count_unread_for_user(conn: &Connection, user_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM messages m
         JOIN thread_participants p ON p.thread_id = m.thread_id AND p.user_id = ?1
         WHERE m.is_read = 0 AND m.sender_id <> ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}
