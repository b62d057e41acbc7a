//! Participant checks shared by the thread registry and the message ledger.
//!
//! These hold no state of their own: the answer always comes from the
//! `thread_participants` rows visible to the connection passed in, so a check
//! made inside a transaction stays valid for the rest of that transaction.

use uuid::Uuid;

use parley_db::Connection;
use parley_db::models::ThreadRow;
use parley_db::queries;

use crate::error::{CoreError, CoreResult};

pub fn is_participant(conn: &Connection, user_id: Uuid, thread_id: Uuid) -> CoreResult<bool> {
    Ok(queries::is_participant(
        conn,
        &thread_id.to_string(),
        &user_id.to_string(),
    )?)
}

/// Fails with `Forbidden` unless `user_id` participates in `thread_id`.
/// A missing thread is also `Forbidden`, so callers learn nothing about
/// threads they are not part of.
pub fn require_participant(
    conn: &Connection,
    user_id: Uuid,
    thread_id: Uuid,
    denial: &str,
) -> CoreResult<()> {
    if is_participant(conn, user_id, thread_id)? {
        Ok(())
    } else {
        Err(CoreError::forbidden(denial))
    }
}

/// Like `require_participant`, but distinguishes a missing thread
/// (`NotFound`) from one the user is not part of (`Forbidden`).
pub fn require_thread_participant(
    conn: &Connection,
    user_id: Uuid,
    thread_id: Uuid,
) -> CoreResult<ThreadRow> {
    let row = queries::thread_by_id(conn, &thread_id.to_string())?
        .ok_or_else(|| CoreError::not_found(format!("Thread {} not found", thread_id)))?;

    require_participant(conn, user_id, thread_id, "You can not access this thread")?;
    Ok(row)
}
