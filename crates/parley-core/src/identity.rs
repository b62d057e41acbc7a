//! Identity store: registration, password checks and user lookup.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use parley_db::{Database, queries};
use parley_types::models::UserRef;

use crate::convert;
use crate::error::{CoreError, CoreResult};

pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct IdentityStore<'a> {
    db: &'a Database,
}

impl<'a> IdentityStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> CoreResult<UserRef> {
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(CoreError::invalid_input("Username must be 3 to 32 characters."));
        }
        if !email.contains('@') {
            return Err(CoreError::invalid_input("Enter a valid email address."));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::invalid_input("Password must be at least 8 characters."));
        }

        // Hash before taking the DB lock; argon2 is deliberately slow
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Storage(anyhow::anyhow!("password hashing failed: {}", e)))?
            .to_string();

        let user_id = Uuid::new_v4();
        self.db.with_tx(|conn| {
            if queries::user_by_username(conn, username)?.is_some() {
                return Err(CoreError::Conflict(format!(
                    "Username '{}' is already taken",
                    username
                )));
            }
            queries::insert_user(
                conn,
                &user_id.to_string(),
                username,
                email,
                &password_hash,
                &convert::now(),
            )?;
            Ok(())
        })?;

        info!("Registered user {} ({})", username, user_id);
        Ok(UserRef {
            id: user_id,
            username: username.to_string(),
        })
    }

    /// Check a username/password pair. An unknown user and a wrong password
    /// produce the same error.
    pub fn authenticate(&self, credentials: &Credentials) -> CoreResult<UserRef> {
        let user = self
            .db
            .get_user_by_username(&credentials.username)?
            .ok_or(CoreError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
            CoreError::Storage(anyhow::anyhow!("corrupt password hash for {}: {}", user.id, e))
        })?;

        Argon2::default()
            .verify_password(credentials.password.as_bytes(), &parsed_hash)
            .map_err(|_| {
                warn!("Failed login for {}", credentials.username);
                CoreError::Unauthorized
            })?;

        Ok(convert::user_ref(&user))
    }

    /// The subset of `ids` that belong to registered users.
    pub fn lookup_users(&self, ids: &[Uuid]) -> CoreResult<Vec<UserRef>> {
        let mut ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        ids.sort();
        ids.dedup();

        let rows = self.db.with_conn(|conn| queries::users_by_ids(conn, &ids))?;
        Ok(rows.iter().map(convert::user_ref).collect())
    }

    pub fn get_user(&self, id: Uuid) -> CoreResult<Option<UserRef>> {
        let row = self.db.get_user_by_id(&id.to_string())?;
        Ok(row.as_ref().map(convert::user_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn register_then_authenticate() {
        let db = Database::open_in_memory().unwrap();
        let identity = IdentityStore::new(&db);

        let alice = identity.register("alice", "alice@example.com", "correct horse").unwrap();
        assert_eq!(alice.username, "alice");

        let authed = identity.authenticate(&creds("alice", "correct horse")).unwrap();
        assert_eq!(authed, alice);

        assert!(matches!(
            identity.authenticate(&creds("alice", "wrong password")),
            Err(CoreError::Unauthorized)
        ));
        assert!(matches!(
            identity.authenticate(&creds("nobody", "correct horse")),
            Err(CoreError::Unauthorized)
        ));

        assert_eq!(identity.get_user(alice.id).unwrap(), Some(alice));
    }

    #[test]
    fn register_validates_input_and_uniqueness() {
        let db = Database::open_in_memory().unwrap();
        let identity = IdentityStore::new(&db);

        assert!(matches!(identity.register("al", "al@example.com", "long enough"), Err(CoreError::InvalidInput(_))));
        assert!(matches!(identity.register("alice", "not-an-email", "long enough"), Err(CoreError::InvalidInput(_))));
        assert!(matches!(identity.register("alice", "alice@example.com", "short"), Err(CoreError::InvalidInput(_))));

        // 7 characters, 14 bytes
        assert!(matches!(identity.register("alice", "alice@example.com", "ééééééé"), Err(CoreError::InvalidInput(_))));

        identity.register("alice", "alice@example.com", "long enough").unwrap();
        assert!(matches!(
            identity.register("alice", "other@example.com", "long enough"),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn lookup_returns_only_existing_users() {
        let db = Database::open_in_memory().unwrap();
        let alice = crate::testing::user(&db, "alice");
        let bob = crate::testing::user(&db, "bob");

        let found = IdentityStore::new(&db)
            .lookup_users(&[alice, Uuid::new_v4(), bob, alice])
            .unwrap();
        let mut names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
