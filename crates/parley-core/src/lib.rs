//! Thread and message consistency rules for parley.
//!
//! Every public operation runs its access check and its write inside a single
//! store transaction, so a request either fully applies or changes nothing.

pub mod access;
pub mod error;
pub mod identity;
pub mod messages;
pub mod pagination;
pub mod threads;

mod convert;

pub use error::{CoreError, CoreResult};
pub use identity::{Credentials, IdentityStore};
pub use messages::MessageLedger;
pub use pagination::Window;
pub use threads::ThreadRegistry;
