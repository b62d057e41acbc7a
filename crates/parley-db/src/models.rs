//! Database row types. These map directly to SQLite rows and are kept
//! separate from the parley-types models so the store stays independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ThreadRow {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ParticipantRow {
    pub thread_id: String,
    pub user_id: String,
    pub username: String,
}

pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub text: String,
    pub created_at: String,
    pub is_read: bool,
}
