#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header::SET_COOKIE, Request, Response, StatusCode},
    Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use warden::{
    auth::{secret::SECRET_LEN, AuthConfig, AuthManager, Clock, ServerSecret},
    email::{EmailMessage, Mailer},
    store::memory::MemoryUserStore,
    warden::{router, security::AllowedHosts},
};

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn advance(&self, by: TimeDelta) {
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
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn last(&self) -> Option<EmailMessage> {
        self.sent.lock().ok().and_then(|sent| sent.last().cloned())
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("mailer lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingMailer>,
    pub store: MemoryUserStore,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_allowed_hosts(AllowedHosts::default())
    }

    pub fn with_allowed_hosts(allowed_hosts: AllowedHosts) -> Result<Self> {
        let start = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")?.with_timezone(&Utc);
        let clock = Arc::new(ManualClock(Mutex::new(start)));
        let mailer = Arc::new(RecordingMailer::default());
        let store = MemoryUserStore::new();
        let secret = ServerSecret::from_bytes(vec![42u8; SECRET_LEN])?;
        let config = AuthConfig::new().with_pbkdf2_iterations(1_000);

        let manager = AuthManager::new(store.clone(), mailer.clone(), secret, config)
            .with_clock(clock.clone());

        Ok(Self {
            router: router(Arc::new(manager), allowed_hosts),
            clock,
            mailer,
            store,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value, Option<String>)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = cookie {
            builder = builder.header("Cookie", format!("user_session={token}"));
        }
        let response = self.send(builder.body(Body::from(body.to_string()))?).await?;
        split(response).await
    }

    pub async fn empty(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
    ) -> Result<(StatusCode, Value, Option<String>)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = cookie {
            builder = builder.header("Cookie", format!("user_session={token}"));
        }
        let response = self.send(builder.body(Body::empty())?).await?;
        split(response).await
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<Value> {
        let (status, body, _) = self
            .json(
                "POST",
                "/user",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": password,
                    "passwordAgain": password,
                }),
            )
            .await?;
        if status != StatusCode::CREATED {
            return Err(anyhow!("create user failed: {status} {body}"));
        }
        Ok(body)
    }

    /// Log in and return the session token from the cookie.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let (status, body, cookie) = self
            .json(
                "POST",
                "/auth",
                None,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await?;
        if status != StatusCode::OK {
            return Err(anyhow!("login failed: {status} {body}"));
        }
        cookie
            .as_deref()
            .and_then(session_token)
            .context("login response without session cookie")
    }

    pub fn last_mail(&self) -> Option<EmailMessage> {
        self.mailer.last()
    }
}

/// Status, JSON body (null when empty) and `Set-Cookie` of a response.
async fn split(response: Response<Body>) -> Result<(StatusCode, Value, Option<String>)> {
    let status = response.status();
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body, cookie))
}

/// Value of `user_session` in a `Set-Cookie` header.
pub fn session_token(set_cookie: &str) -> Option<String> {
    let first = set_cookie.split(';').next()?;
    let value = first.trim().strip_prefix("user_session=")?;
    Some(value.to_string())
}
