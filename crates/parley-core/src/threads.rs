//! Thread registry: the only code path that creates, extends or deletes
//! threads.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_db::models::ThreadRow;
use parley_db::{Connection, Database, queries};
use parley_types::api::Page;
use parley_types::models::{Thread, UserRef};

use crate::access;
use crate::convert;
use crate::error::{CoreError, CoreResult};
use crate::pagination::Window;

/// Page size for thread listings when the caller gives none.
pub const DEFAULT_THREAD_LIMIT: u32 = 5;

/// Every thread has exactly this many participants.
pub const PARTICIPANTS_PER_THREAD: u64 = 2;

pub struct ThreadRegistry<'a> {
    db: &'a Database,
}

impl<'a> ThreadRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Threads `user_id` participates in, most recently updated first.
    pub fn list(&self, user_id: Uuid, window: Window) -> CoreResult<Page<Thread>> {
        self.db.with_conn(|conn| {
            let uid = user_id.to_string();
            let count = queries::count_threads_for_user(conn, &uid)?;
            let rows = queries::threads_for_user(conn, &uid, window.limit, window.offset)?;
            let threads = load_threads(conn, &rows)?;
            Ok(window.page(count, threads))
        })
    }

    /// Create the thread between two users, or return the one that already
    /// exists for that pair. The bool is `true` when a new thread was made.
    ///
    /// Validation, the pair lookup and the insert share one immediate
    /// transaction, so concurrent creates for the same pair serialize and the
    /// later one returns the earlier one's thread.
    pub fn create(&self, requester: Uuid, participants: &[Uuid]) -> CoreResult<(Thread, bool)> {
        let [a, b] = participants else {
            return Err(CoreError::invalid_participants(
                "A thread must have exactly 2 participants.",
            ));
        };
        let (a, b) = (*a, *b);
        if a == b {
            return Err(CoreError::invalid_participants(
                "A thread needs two distinct participants.",
            ));
        }

        self.db.with_tx(|conn| {
            let ids = [a.to_string(), b.to_string()];
            if queries::users_by_ids(conn, &ids)?.len() != 2 {
                return Err(CoreError::invalid_participants(
                    "Both participants must be valid users.",
                ));
            }

            if requester != a && requester != b {
                warn!("User {} tried to create a thread for {} and {}", requester, a, b);
                return Err(CoreError::forbidden("You cannot create this thread"));
            }

            if let Some(existing) = queries::find_thread_for_pair(conn, &ids[0], &ids[1])? {
                debug!("Thread {} already exists for {} and {}", existing, a, b);
                let row = queries::thread_by_id(conn, &existing)?.ok_or_else(|| {
                    CoreError::Storage(anyhow::anyhow!("thread {} vanished mid-transaction", existing))
                })?;
                let thread = load_thread(conn, &row)?;
                if !thread.has_participant(a) || !thread.has_participant(b) {
                    return Err(CoreError::Storage(anyhow::anyhow!(
                        "pair lookup returned thread {} without both participants",
                        thread.id
                    )));
                }
                return Ok((thread, false));
            }

            let thread_id = Uuid::new_v4().to_string();
            let now = convert::now();
            queries::insert_thread(conn, &thread_id, &now)?;
            attach(conn, &thread_id, &ids[0], &now)?;
            attach(conn, &thread_id, &ids[1], &now)?;

            let row = ThreadRow {
                id: thread_id,
                created_at: now.clone(),
                updated_at: now,
            };
            let thread = load_thread(conn, &row)?;
            info!("Created thread {} for {} and {}", thread.id, a, b);
            Ok((thread, true))
        })
    }

    pub fn get(&self, requester: Uuid, thread_id: Uuid) -> CoreResult<Thread> {
        self.db.with_conn(|conn| {
            let row = access::require_thread_participant(conn, requester, thread_id)?;
            load_thread(conn, &row)
        })
    }

    /// Attach another user to an existing thread. Threads are finalized with
    /// two participants at creation, so this only ever succeeds on a thread
    /// that is somehow short a participant; otherwise nothing changes.
    pub fn add_participant(&self, requester: Uuid, thread_id: Uuid, user_id: Uuid) -> CoreResult<Thread> {
        self.db.with_tx(|conn| {
            access::require_thread_participant(conn, requester, thread_id)?;

            let uid = user_id.to_string();
            if queries::user_by_id(conn, &uid)?.is_none() {
                return Err(CoreError::invalid_participants(format!(
                    "User {} does not exist",
                    user_id
                )));
            }

            let tid = thread_id.to_string();
            attach(conn, &tid, &uid, &convert::now())?;

            let row = queries::thread_by_id(conn, &tid)?
                .ok_or_else(|| CoreError::not_found(format!("Thread {} not found", thread_id)))?;
            load_thread(conn, &row)
        })
    }

    /// Delete a thread the requester participates in, along with its messages.
    pub fn delete(&self, requester: Uuid, thread_id: Uuid) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            access::require_thread_participant(conn, requester, thread_id)?;
            queries::delete_thread(conn, &thread_id.to_string())?;
            info!("User {} deleted thread {}", requester, thread_id);
            Ok(())
        })
    }
}

/// The single write path for participant links. Runs inside the caller's
/// transaction: the count it checks is the count the insert lands on.
fn attach(conn: &Connection, thread_id: &str, user_id: &str, now: &str) -> CoreResult<()> {
    if queries::is_participant(conn, thread_id, user_id)? {
        return Err(CoreError::invalid_participants(format!(
            "User {} is already a participant of this thread",
            user_id
        )));
    }

    if queries::participant_count(conn, thread_id)? >= PARTICIPANTS_PER_THREAD {
        warn!("Rejected third participant {} for thread {}", user_id, thread_id);
        return Err(CoreError::invalid_participants(
            "A thread cannot have more than 2 participants.",
        ));
    }

    queries::insert_participant(conn, thread_id, user_id)?;
    queries::touch_thread(conn, thread_id, now)?;
    Ok(())
}

fn load_thread(conn: &Connection, row: &ThreadRow) -> CoreResult<Thread> {
    let mut threads = load_threads(conn, std::slice::from_ref(row))?;
    threads
        .pop()
        .ok_or_else(|| CoreError::Storage(anyhow::anyhow!("thread {} failed to load", row.id)))
}

/// Resolve participants for a batch of thread rows with one query.
fn load_threads(conn: &Connection, rows: &[ThreadRow]) -> CoreResult<Vec<Thread>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut by_thread: HashMap<String, Vec<UserRef>> = HashMap::new();
    for p in queries::participants_for_threads(conn, &ids)? {
        by_thread.entry(p.thread_id).or_default().push(UserRef {
            id: convert::parse_id(&p.user_id, "participant user_id"),
            username: p.username,
        });
    }

    rows.iter()
        .map(|row| convert::thread(row, by_thread.remove(&row.id).unwrap_or_default()))
        .collect()
}
