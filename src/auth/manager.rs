//! Login, sessions and password resets.
//!
//! Flow Overview:
//! - login: `authenticate` checks the password, `register_session` signs a
//!   session token the caller hands out as a cookie.
//! - every authenticated request: `retrieve_session` verifies the token and
//!   loads its subject.
//! - reset: `request_password_reset` mails a short-lived reset token,
//!   `reset_password` consumes it. A reset token is dead as soon as the
//!   account changes after it was issued, which includes the reset itself.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{
    clock::{Clock, SystemClock},
    error::AuthError,
    forms::{Loginable, NewPassword, ResetRequestable, Resettable},
    middleware::SameSite,
    password::{Credential, PasswordHasher, DEFAULT_ITERATIONS},
    principal::Principal,
    secret::ServerSecret,
    store::{StoreError, UserStore},
    token::{Token, TokenCodec, TokenError, TokenKind},
};
use crate::email::{EmailMessage, Mailer};

const DEFAULT_SESSION_TTL_SECONDS: u32 = 60 * 60;
const DEFAULT_RESET_TTL_SECONDS: u32 = 10 * 60;

pub const RESET_MAIL_SUBJECT: &str = "Password reset code";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: u32,
    reset_ttl_seconds: u32,
    pbkdf2_iterations: u32,
    cookie_secure: bool,
    cookie_same_site: SameSite,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            pbkdf2_iterations: DEFAULT_ITERATIONS,
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u32) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: u32) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u32 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn reset_ttl_seconds(&self) -> u32 {
        self.reset_ttl_seconds
    }

    #[must_use]
    pub fn pbkdf2_iterations(&self) -> u32 {
        self.pbkdf2_iterations
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn cookie_same_site(&self) -> SameSite {
        self.cookie_same_site
    }

    fn session_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.session_ttl_seconds))
    }

    fn reset_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.reset_ttl_seconds))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point of the auth core, shared by all requests.
///
/// Holds no per-request state; everything mutable lives in the store.
pub struct AuthManager<S> {
    store: S,
    mailer: Arc<dyn Mailer>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl<S: UserStore> AuthManager<S> {
    #[must_use]
    pub fn new(store: S, mailer: Arc<dyn Mailer>, secret: ServerSecret, config: AuthConfig) -> Self {
        Self {
            store,
            mailer,
            codec: TokenCodec::new(secret),
            hasher: PasswordHasher::new(config.pbkdf2_iterations()),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve a login form to its account.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown username or a wrong password,
    /// `DependencyFailure` when the store cannot be queried.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, form: &impl Loginable) -> Result<S::Account, AuthError> {
        let account = match self.store.find_by_username(form.username()).await {
            Ok(account) => Some(account),
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(AuthError::dependency(err)),
        };

        let credential = account
            .as_ref()
            .map_or_else(Credential::decoy, |account| account.credential().clone());
        let matches = self.verify_password(form.password(), credential).await?;

        match account {
            Some(account) if matches => Ok(account),
            _ => {
                debug!("login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Sign a session token for `account`, valid from now for the session TTL.
    ///
    /// # Errors
    /// `Token` if the token cannot be serialized.
    pub fn register_session(&self, account: &S::Account) -> Result<Token, AuthError> {
        let token = self.codec.sign(
            account.id(),
            TokenKind::Session,
            self.clock.now(),
            self.config.session_ttl(),
        )?;
        Ok(token)
    }

    /// Resolve a transported session token to its account.
    ///
    /// # Errors
    /// `Forbidden` for any token that is malformed, forged, expired, not a
    /// session token, or whose subject no longer exists. `DependencyFailure`
    /// when the store cannot be queried.
    #[instrument(skip_all)]
    pub async fn retrieve_session(&self, encoded: &str) -> Result<S::Account, AuthError> {
        let token = self
            .codec
            .decode(encoded)
            .map_err(|_| AuthError::Forbidden)?;
        if token.info.kind != TokenKind::Session {
            return Err(AuthError::Forbidden);
        }
        if let Err(err) = self.codec.check(&token, self.clock.now()) {
            debug!("session token rejected: {err}");
            return Err(AuthError::Forbidden);
        }

        match self.store.find_by_id(token.info.subject_id).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound) => Err(AuthError::Forbidden),
            Err(err) => Err(AuthError::dependency(err)),
        }
    }

    /// Sessions are not stored, so there is nothing to tear down here; the
    /// caller clears the cookie. The token itself stays valid until expiry.
    pub fn remove_session(&self, account: &S::Account) {
        debug!(user_id = account.id(), "session removed");
    }

    /// Mail a reset token to the owner of `email`.
    ///
    /// # Errors
    /// `NotFound` for an unknown email, `DependencyFailure` when the store or
    /// the mailer fail.
    #[instrument(skip_all)]
    pub async fn request_password_reset(
        &self,
        form: &impl ResetRequestable,
    ) -> Result<(), AuthError> {
        let account = match self.store.find_by_email(form.email()).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(AuthError::NotFound),
            Err(err) => return Err(AuthError::dependency(err)),
        };

        let token = self.codec.sign(
            account.id(),
            TokenKind::Reset,
            self.clock.now(),
            self.config.reset_ttl(),
        )?;
        let message = EmailMessage {
            to_email: form.email().to_string(),
            subject: RESET_MAIL_SUBJECT.to_string(),
            body: self.codec.encode(&token)?,
        };
        self.mailer
            .send(&message)
            .map_err(AuthError::dependency)?;

        debug!(user_id = account.id(), "reset token sent");
        Ok(())
    }

    /// Consume a reset token and set the new password.
    ///
    /// # Errors
    /// `PasswordMismatch` when the confirmation differs, `InvalidToken` for a
    /// malformed, forged or non-reset token, `TokenExpired` when the window has
    /// elapsed or the account changed after the token was issued, `NotFound`
    /// when the subject no longer exists, `DependencyFailure` when the store
    /// fails.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, form: &impl Resettable) -> Result<(), AuthError> {
        if !form.passwords_match() {
            return Err(AuthError::PasswordMismatch);
        }

        let token = self
            .codec
            .decode(form.token())
            .map_err(|_| AuthError::InvalidToken)?;
        if token.info.kind != TokenKind::Reset {
            return Err(AuthError::InvalidToken);
        }
        match self.codec.check(&token, self.clock.now()) {
            Ok(()) => {}
            Err(TokenError::Expired) => return Err(AuthError::TokenExpired),
            Err(_) => return Err(AuthError::InvalidToken),
        }

        let issued_at = token.info.issued_at;
        let account = match self.store.find_by_id(token.info.subject_id).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(AuthError::NotFound),
            Err(err) => return Err(AuthError::dependency(err)),
        };
        if account.updated_at() > issued_at {
            debug!(user_id = account.id(), "reset token predates last account change");
            return Err(AuthError::TokenExpired);
        }

        let credential = self.derive_password(form.password()).await?;
        // Stamped after derivation: tokens issued meanwhile must not outlive it.
        let changed_at = self.clock.now();
        match self
            .store
            .update_password(account.id(), &credential, changed_at, Some(issued_at))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Stale) => {
                warn!(user_id = account.id(), "account changed while resetting password");
                Err(AuthError::TokenExpired)
            }
            Err(StoreError::NotFound) => Err(AuthError::NotFound),
            Err(err) => Err(AuthError::dependency(err)),
        }
    }

    /// Change the password of an authenticated account.
    ///
    /// # Errors
    /// `PasswordMismatch` when the confirmation differs, `NotFound` if the
    /// account disappeared, `DependencyFailure` when the store fails.
    #[instrument(skip_all)]
    pub async fn set_password(
        &self,
        account: &S::Account,
        form: &impl NewPassword,
    ) -> Result<(), AuthError> {
        if !form.passwords_match() {
            return Err(AuthError::PasswordMismatch);
        }
        let credential = self.derive_password(form.password()).await?;
        match self
            .store
            .update_password(account.id(), &credential, self.clock.now(), None)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(AuthError::NotFound),
            Err(err) => Err(AuthError::dependency(err)),
        }
    }

    /// Derive a credential for a new account.
    ///
    /// # Errors
    /// `Password` if the OS RNG fails.
    pub async fn credential_for(&self, password: &str) -> Result<Credential, AuthError> {
        self.derive_password(password).await
    }

    /// # Errors
    /// `Token` if the token cannot be serialized.
    pub fn encode(&self, token: &Token) -> Result<String, AuthError> {
        Ok(self.codec.encode(token)?)
    }

    // PBKDF2 is CPU bound; keep it off the async workers.
    async fn derive_password(&self, password: &str) -> Result<Credential, AuthError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        let credential = tokio::task::spawn_blocking(move || hasher.derive(&password))
            .await
            .map_err(AuthError::dependency)??;
        Ok(credential)
    }

    async fn verify_password(
        &self,
        password: &str,
        credential: Credential,
    ) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &credential))
            .await
            .map_err(AuthError::dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::secret::SECRET_LEN;
    use crate::store::{memory::MemoryUserStore, NewUser, User, UserRepository};
    use anyhow::{anyhow, Context, Result};
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: TimeDelta) {
            if let Ok(mut now) = self.0.lock() {
                *now += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn last_body(&self) -> Option<String> {
            self.sent
                .lock()
                .ok()
                .and_then(|sent| sent.last().map(|message| message.body.clone()))
        }
    }

    impl Mailer for RecordingMailer {
        fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("smtp down"));
            }
            self.sent
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(message.clone());
            Ok(())
        }
    }

    struct Login(&'static str, &'static str);

    impl Loginable for Login {
        fn username(&self) -> &str {
            self.0
        }

        fn password(&self) -> &str {
            self.1
        }
    }

    struct ResetRequest(&'static str);

    impl ResetRequestable for ResetRequest {
        fn email(&self) -> &str {
            self.0
        }
    }

    struct Change(&'static str, &'static str);

    impl NewPassword for Change {
        fn password(&self) -> &str {
            self.0
        }

        fn password_again(&self) -> &str {
            self.1
        }
    }

    struct Reset {
        token: String,
        password: &'static str,
        password_again: &'static str,
    }

    impl NewPassword for Reset {
        fn password(&self) -> &str {
            self.password
        }

        fn password_again(&self) -> &str {
            self.password_again
        }
    }

    impl Resettable for Reset {
        fn token(&self) -> &str {
            &self.token
        }
    }

    fn reset(token: String, password: &'static str) -> Reset {
        Reset {
            token,
            password,
            password_again: password,
        }
    }

    struct Fixture<S = MemoryUserStore> {
        manager: AuthManager<S>,
        clock: Arc<ManualClock>,
        mailer: Arc<RecordingMailer>,
        user: User,
    }

    const TEST_SECRET: [u8; SECRET_LEN] = [9u8; SECRET_LEN];

    /// Manager over `wrap(users)`, where `users` already holds "user".
    async fn fixture_over<S: UserStore>(
        mailer: RecordingMailer,
        wrap: impl FnOnce(MemoryUserStore) -> S,
    ) -> Result<Fixture<S>> {
        let start = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")?.with_timezone(&Utc);
        let clock = Arc::new(ManualClock(Mutex::new(start)));
        let mailer = Arc::new(mailer);
        let secret = ServerSecret::from_bytes(TEST_SECRET.to_vec())?;
        let config = AuthConfig::new().with_pbkdf2_iterations(1_000);

        let users = MemoryUserStore::new();
        let user = users
            .create_user(NewUser {
                username: "user".to_string(),
                email: "user@example.com".to_string(),
                credential: PasswordHasher::new(1_000).derive("password")?,
                created_at: start,
            })
            .await?;
        let manager =
            AuthManager::new(wrap(users), mailer.clone(), secret, config).with_clock(clock.clone());
        clock.advance(TimeDelta::seconds(1));

        Ok(Fixture {
            manager,
            clock,
            mailer,
            user,
        })
    }

    async fn fixture_with(mailer: RecordingMailer) -> Result<Fixture> {
        fixture_over(mailer, |users| users).await
    }

    type LookupHook = Box<dyn FnOnce() -> Option<DateTime<Utc>> + Send>;

    /// Runs a one-shot hook right after the next lookup by id. When the hook
    /// returns a time, the account is re-saved as changed at that time, so
    /// the caller holds an outdated copy.
    struct InterleavedStore {
        users: MemoryUserStore,
        on_lookup: Mutex<Option<LookupHook>>,
    }

    impl InterleavedStore {
        fn new(users: MemoryUserStore) -> Self {
            Self {
                users,
                on_lookup: Mutex::new(None),
            }
        }

        fn arm(&self, hook: impl FnOnce() -> Option<DateTime<Utc>> + Send + 'static) {
            if let Ok(mut slot) = self.on_lookup.lock() {
                *slot = Some(Box::new(hook));
            }
        }
    }

    impl UserStore for InterleavedStore {
        type Account = User;

        async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
            self.users.find_by_username(username).await
        }

        async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
            self.users.find_by_email(email).await
        }

        async fn find_by_id(&self, id: u64) -> Result<User, StoreError> {
            let user = self.users.find_by_id(id).await?;
            let hook = self.on_lookup.lock().ok().and_then(|mut slot| slot.take());
            if let Some(changed_at) = hook.and_then(|hook| hook()) {
                self.users
                    .update_password(id, &user.credential, changed_at, None)
                    .await?;
            }
            Ok(user)
        }

        async fn update_password(
            &self,
            id: u64,
            credential: &Credential,
            changed_at: DateTime<Utc>,
            unmodified_since: Option<DateTime<Utc>>,
        ) -> Result<(), StoreError> {
            self.users
                .update_password(id, credential, changed_at, unmodified_since)
                .await
        }
    }

    async fn fixture() -> Result<Fixture> {
        fixture_with(RecordingMailer::default()).await
    }

    #[tokio::test]
    async fn authenticate_checks_password() -> Result<()> {
        let f = fixture().await?;
        let account = f.manager.authenticate(&Login("user", "password")).await?;
        assert_eq!(account.id, f.user.id);

        assert!(matches!(
            f.manager.authenticate(&Login("user", "wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            f.manager.authenticate(&Login("nobody", "password")).await,
            Err(AuthError::InvalidCredentials)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn registered_session_resolves_to_subject() -> Result<()> {
        let f = fixture().await?;
        let token = f.manager.register_session(&f.user)?;
        let encoded = f.manager.encode(&token)?;
        let account = f.manager.retrieve_session(&encoded).await?;
        assert_eq!(account.id, f.user.id);
        assert_eq!(
            token.info.expires_at - token.info.issued_at,
            TimeDelta::hours(1)
        );
        Ok(())
    }

    #[tokio::test]
    async fn tampered_session_is_forbidden() -> Result<()> {
        let f = fixture().await?;
        let encoded = f.manager.encode(&f.manager.register_session(&f.user)?)?;

        for index in 0..encoded.len() {
            let mut tampered = encoded.clone().into_bytes();
            tampered[index] = if tampered[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered)?;
            assert!(
                matches!(
                    f.manager.retrieve_session(&tampered).await,
                    Err(AuthError::Forbidden)
                ),
                "index {index}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn session_expires() -> Result<()> {
        let f = fixture().await?;
        let encoded = f.manager.encode(&f.manager.register_session(&f.user)?)?;

        f.clock.advance(TimeDelta::hours(1));
        assert!(f.manager.retrieve_session(&encoded).await.is_ok());

        f.clock.advance(TimeDelta::seconds(1));
        assert!(matches!(
            f.manager.retrieve_session(&encoded).await,
            Err(AuthError::Forbidden)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn session_of_deleted_account_is_forbidden() -> Result<()> {
        let f = fixture().await?;
        let encoded = f.manager.encode(&f.manager.register_session(&f.user)?)?;
        f.manager.store().remove(f.user.id).await;
        assert!(matches!(
            f.manager.retrieve_session(&encoded).await,
            Err(AuthError::Forbidden)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn password_reset_flow() -> Result<()> {
        let f = fixture().await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let token = f.mailer.last_body().context("reset mail")?;

        f.clock.advance(TimeDelta::seconds(30));
        f.manager.reset_password(&reset(token.clone(), "new password")).await?;

        assert!(f
            .manager
            .authenticate(&Login("user", "new password"))
            .await
            .is_ok());
        assert!(matches!(
            f.manager.authenticate(&Login("user", "password")).await,
            Err(AuthError::InvalidCredentials)
        ));

        // The reset moved updated_at past the token's issue time.
        f.clock.advance(TimeDelta::seconds(1));
        assert!(matches!(
            f.manager.reset_password(&reset(token, "third password")).await,
            Err(AuthError::TokenExpired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn direct_password_change_invalidates_reset_token() -> Result<()> {
        let f = fixture().await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let token = f.mailer.last_body().context("reset mail")?;

        f.clock.advance(TimeDelta::seconds(5));
        f.manager
            .set_password(&f.user, &Change("changed pass", "changed pass"))
            .await?;

        f.clock.advance(TimeDelta::seconds(5));
        assert!(matches!(
            f.manager.reset_password(&reset(token, "new password")).await,
            Err(AuthError::TokenExpired)
        ));
        assert!(f
            .manager
            .authenticate(&Login("user", "changed pass"))
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn reset_token_expires() -> Result<()> {
        let f = fixture().await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let token = f.mailer.last_body().context("reset mail")?;

        f.clock.advance(TimeDelta::minutes(10) + TimeDelta::seconds(1));
        assert!(matches!(
            f.manager.reset_password(&reset(token, "new password")).await,
            Err(AuthError::TokenExpired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn token_kinds_do_not_cross() -> Result<()> {
        let f = fixture().await?;
        let session = f.manager.encode(&f.manager.register_session(&f.user)?)?;
        assert!(matches!(
            f.manager.reset_password(&reset(session, "new password")).await,
            Err(AuthError::InvalidToken)
        ));

        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let reset_token = f.mailer.last_body().context("reset mail")?;
        assert!(matches!(
            f.manager.retrieve_session(&reset_token).await,
            Err(AuthError::Forbidden)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reset_rejects_garbage_and_mismatch() -> Result<()> {
        let f = fixture().await?;
        assert!(matches!(
            f.manager
                .reset_password(&reset("garbage".to_string(), "new password"))
                .await,
            Err(AuthError::InvalidToken)
        ));

        let mismatch = Reset {
            token: "garbage".to_string(),
            password: "new password",
            password_again: "other password",
        };
        assert!(matches!(
            f.manager.reset_password(&mismatch).await,
            Err(AuthError::PasswordMismatch)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reset_token_issued_during_a_reset_is_dead() -> Result<()> {
        let f = fixture_over(RecordingMailer::default(), InterleavedStore::new).await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let first = f.mailer.last_body().context("reset mail")?;

        // A second code goes out while the first reset is deriving its digest.
        let late = Arc::new(Mutex::new(None));
        let codec = TokenCodec::new(ServerSecret::from_bytes(TEST_SECRET.to_vec())?);
        let (clock, slot, user_id) = (f.clock.clone(), late.clone(), f.user.id);
        f.manager.store().arm(move || {
            clock.advance(TimeDelta::seconds(5));
            let token = codec
                .sign(user_id, TokenKind::Reset, clock.now(), TimeDelta::minutes(10))
                .and_then(|token| codec.encode(&token))
                .ok();
            if let Ok(mut slot) = slot.lock() {
                *slot = token;
            }
            clock.advance(TimeDelta::seconds(5));
            None
        });

        f.manager.reset_password(&reset(first, "new password")).await?;
        let late = late
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .context("code issued during the reset")?;

        let account = f.manager.store().find_by_id(f.user.id).await?;
        assert_eq!(account.updated_at, f.clock.now());

        f.clock.advance(TimeDelta::seconds(1));
        assert!(matches!(
            f.manager.reset_password(&reset(late, "other password")).await,
            Err(AuthError::TokenExpired)
        ));
        assert!(f
            .manager
            .authenticate(&Login("user", "new password"))
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn reset_loses_to_a_concurrent_change() -> Result<()> {
        let f = fixture_over(RecordingMailer::default(), InterleavedStore::new).await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let token = f.mailer.last_body().context("reset mail")?;

        // The account passes the freshness check, then changes before the write.
        let changed_at = f.clock.now() + TimeDelta::seconds(1);
        f.manager.store().arm(move || Some(changed_at));
        f.clock.advance(TimeDelta::seconds(2));

        assert!(matches!(
            f.manager.reset_password(&reset(token, "new password")).await,
            Err(AuthError::TokenExpired)
        ));
        assert!(f
            .manager
            .authenticate(&Login("user", "password"))
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn reset_for_deleted_account_is_not_found() -> Result<()> {
        let f = fixture().await?;
        f.manager
            .request_password_reset(&ResetRequest("user@example.com"))
            .await?;
        let token = f.mailer.last_body().context("reset mail")?;
        f.manager.store().remove(f.user.id).await;
        assert!(matches!(
            f.manager.reset_password(&reset(token, "new password")).await,
            Err(AuthError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reset_request_for_unknown_email() -> Result<()> {
        let f = fixture().await?;
        assert!(matches!(
            f.manager
                .request_password_reset(&ResetRequest("nobody@example.com"))
                .await,
            Err(AuthError::NotFound)
        ));
        assert!(f.mailer.last_body().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn mailer_failure_is_a_dependency_failure() -> Result<()> {
        let f = fixture_with(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        })
        .await?;
        assert!(matches!(
            f.manager
                .request_password_reset(&ResetRequest("user@example.com"))
                .await,
            Err(AuthError::DependencyFailure(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn set_password_requires_confirmation() -> Result<()> {
        let f = fixture().await?;
        assert!(matches!(
            f.manager
                .set_password(&f.user, &Change("new password", "New password"))
                .await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(f
            .manager
            .authenticate(&Login("user", "password"))
            .await
            .is_ok());
        Ok(())
    }

    #[test]
    fn config_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.reset_ttl_seconds(), 600);
        assert_eq!(config.pbkdf2_iterations(), DEFAULT_ITERATIONS);
        assert!(!config.cookie_secure());
        assert_eq!(config.cookie_same_site(), SameSite::Lax);
    }
}
