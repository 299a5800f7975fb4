//! Authentication core: password digests, signed tokens, and the manager
//! tying them to an account store.

pub mod clock;
pub mod error;
pub mod forms;
pub mod manager;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod secret;
pub mod store;
pub mod token;

pub use self::{
    clock::{Clock, SystemClock},
    error::AuthError,
    forms::{Loginable, NewPassword, ResetRequestable, Resettable},
    manager::{AuthConfig, AuthManager},
    middleware::{require_session, SameSite, SESSION_COOKIE_NAME},
    password::{Credential, PasswordHasher},
    principal::Principal,
    secret::{ConfigurationError, ServerSecret},
    store::{StoreError, UserStore},
    token::{Token, TokenCodec, TokenKind},
};
