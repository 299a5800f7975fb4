//! # Warden
//!
//! User accounts with stateless, signed session and password reset tokens.
//!
//! The [`auth`] module is the core: PBKDF2 password digests, HMAC-SHA256 signed
//! tokens, and [`auth::AuthManager`] tying them to an account store. Tokens are
//! never stored server-side; a reset token stops working as soon as the
//! account changes after it was issued.

pub mod auth;
pub mod cli;
pub mod email;
pub mod store;
pub mod warden;

pub use warden::GIT_COMMIT_HASH;
