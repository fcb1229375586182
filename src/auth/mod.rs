//! Authentication and tenant authorization core.
//!
//! Flow Overview:
//! 1) `account` validates login/registration input and checks passwords.
//! 2) `token` issues a signed credential bound to the identity's role and site.
//! 3) Every request is verified by the API guard, producing an [`AuthContext`].
//! 4) `scope` derives the site filter for data access from that context only.
//!
//! Nothing here keeps per-session state: the codec is keyed by the process-wide
//! secret, and the store is only consulted by login, registration, and session
//! bootstrap.

pub mod account;
mod context;
mod error;
pub mod join_code;
pub mod password;
mod role;
pub mod scope;
pub mod token;

pub use context::AuthContext;
pub use error::AuthError;
pub use role::{Role, RoleSet};
pub use scope::SiteScope;
pub use token::{TokenCodec, TokenError};
