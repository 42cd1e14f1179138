//! # Authentication Service
//!
//! The authority for user accounts and sessions. Every other service
//! learns about users exclusively through the events this service emits:
//!
//! | Operation | Emits |
//! |-----------|-------|
//! | `signup` | `UserAdded` |
//! | `create_admin` | `AdminAdded` |
//! | `login` | `UserLoggedIn` |
//! | `logout` | `UserLoggedOut` |
//! | `edit_profile` | `UserEdited` |
//! | `remove_account` | `UserRemoved` |
//! | `admin_remove_user` | `AdminRemovedUser` |
//!
//! Passwords never leave this crate. Emitted `UserEdited` patches are
//! stripped of the password field; the hash lives only in the local
//! account table.

pub mod password;
pub mod service;

pub use password::{PasswordHasher, Sha256PasswordHasher, StoredPassword};
pub use service::{Account, AuthenticationService};
