//! Message ledger: posting into threads, listing them, and the one-way
//! read-state transition.

use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::api::Page;
use parley_types::models::Message;

use crate::access;
use crate::convert;
use crate::error::{CoreError, CoreResult};
use crate::pagination::Window;

/// Page size for message listings when the caller gives none.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 10;

pub struct MessageLedger<'a> {
    db: &'a Database,
}

impl<'a> MessageLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Messages of a thread, oldest first.
    pub fn list(&self, requester: Uuid, thread_id: Uuid, window: Window) -> CoreResult<Page<Message>> {
        self.db.with_conn(|conn| {
            access::require_participant(conn, requester, thread_id, "You do not have access to this thread")?;

            let tid = thread_id.to_string();
            let count = queries::count_messages(conn, &tid)?;
            let messages: Vec<Message> = queries::messages_for_thread(conn, &tid, window.limit, window.offset)?
                .into_iter()
                .map(convert::message)
                .collect();
            Ok(window.page(count, messages))
        })
    }

    /// Post `text` into a thread as `requester`.
    ///
    /// The sender has obviously seen their own message, so it is stored
    /// with `is_read = true`. Posting bumps the thread's `updated` time.
    pub fn create(&self, requester: Uuid, thread_id: Uuid, text: &str) -> CoreResult<Message> {
        self.db.with_tx(|conn| {
            access::require_participant(conn, requester, thread_id, "You cannot send a message in this thread")?;

            if text.trim().is_empty() {
                return Err(CoreError::invalid_input("Message text may not be blank."));
            }

            let message_id = Uuid::new_v4().to_string();
            let tid = thread_id.to_string();
            let now = convert::now();
            queries::insert_message(conn, &message_id, &tid, &requester.to_string(), text, &now, true)?;
            queries::touch_thread(conn, &tid, &now)?;

            let row = queries::message_by_id(conn, &message_id)?.ok_or_else(|| {
                CoreError::Storage(anyhow::anyhow!("message {} missing after insert", message_id))
            })?;
            debug!("User {} posted message {} in thread {}", requester, message_id, thread_id);
            Ok(convert::message(row))
        })
    }

    /// Mark a message someone else sent as read. Calling it again on a
    /// message that is already read succeeds without changing anything.
    pub fn mark_read(&self, requester: Uuid, message_id: Uuid) -> CoreResult<Message> {
        self.db.with_tx(|conn| {
            let mid = message_id.to_string();
            let row = queries::message_visible_to(conn, &mid, &requester.to_string())?
                .ok_or_else(|| CoreError::not_found(format!("Message {} not found", message_id)))?;

            let mut message = convert::message(row);
            if message.sender.id == requester {
                warn!("User {} tried to mark own message {} as read", requester, message_id);
                return Err(CoreError::forbidden("You cannot mark your own message as read"));
            }

            if queries::mark_message_read(conn, &mid)? == 0 {
                debug!("Message {} was already read", message_id);
            } else {
                info!("User {} read message {}", requester, message_id);
            }
            message.is_read = true;
            Ok(message)
        })
    }

    /// Unread messages addressed to `requester` across all of their threads.
    pub fn unread_count(&self, requester: Uuid) -> CoreResult<u64> {
        self.db.with_conn(|conn| {
            let uid = requester.to_string();
            if queries::count_threads_for_user(conn, &uid)? == 0 {
                return Err(CoreError::NoAccess("You cannot access this thread".into()));
            }
            Ok(queries::count_unread_for_user(conn, &uid)?)
        })
    }
}
