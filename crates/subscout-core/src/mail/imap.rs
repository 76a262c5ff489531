//! IMAP mail source
//!
//! The `imap` crate is blocking, so every call runs on the blocking pool
//! against a session that stays behind a shared lock. The mailbox is opened
//! read-only and bodies are fetched with `BODY.PEEK[]`, so scanning leaves
//! `\Seen` flags untouched.

use std::sync::{Arc, Mutex, TryLockError};

use async_trait::async_trait;
use imap::{ClientBuilder, ConnectionMode};
use tracing::{debug, warn};

use crate::error::MailboxError;

use super::MailSource;

pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Fetch items for a whole message without setting `\Seen`
const FETCH_ITEMS: &str = "BODY.PEEK[]";

type Session = imap::Session<imap::Connection>;

/// Shared home for a blocking session.
///
/// The lock is only waited on from the blocking pool, and the session never leaves
/// the slot during a call, so a caller that stops waiting (a timed-out
/// message) leaves it in place for the next one.
struct SessionSlot<S> {
    inner: Arc<Mutex<Option<S>>>,
}

impl<S: Send + 'static> SessionSlot<S> {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Busy counts as connected: only a running call holds the lock
    fn is_connected(&self) -> bool {
        match self.inner.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }

    /// Run `f` against the slot itself on the blocking pool
    async fn with_slot<T, F>(&self, f: F) -> Result<T, MailboxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Option<S>) -> Result<T, MailboxError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut slot = inner
                .lock()
                .map_err(|_| MailboxError::Connection("IMAP session lock poisoned".into()))?;
            f(&mut slot)
        })
        .await
        .map_err(|e| MailboxError::Connection(e.to_string()))?
    }

    /// Run `f` against the session; `NotAuthenticated` when there is none
    async fn run<T, F>(&self, f: F) -> Result<T, MailboxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T, MailboxError> + Send + 'static,
    {
        self.with_slot(move |slot| match slot.as_mut() {
            Some(session) => f(session),
            None => Err(MailboxError::NotAuthenticated),
        })
        .await
    }

    async fn put(&self, session: S) -> Result<(), MailboxError> {
        self.with_slot(move |slot| {
            *slot = Some(session);
            Ok(())
        })
        .await
    }

    async fn take(&self) -> Result<Option<S>, MailboxError> {
        self.with_slot(|slot| Ok(slot.take())).await
    }
}

pub struct ImapMailSource {
    host: String,
    port: u16,
    mailbox: String,
    session: SessionSlot<Session>,
}

impl std::fmt::Debug for ImapMailSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailSource")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mailbox", &self.mailbox)
            .field("connected", &self.session.is_connected())
            .finish()
    }
}

impl ImapMailSource {
    pub fn new(host: &str, port: u16, mailbox: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            mailbox: mailbox.to_string(),
            session: SessionSlot::new(),
        }
    }

    /// Host and port from `IMAP_HOST` / `IMAP_PORT`, with Gmail defaults
    pub fn from_env(mailbox: &str) -> Self {
        let host = std::env::var("IMAP_HOST").unwrap_or_else(|_| DEFAULT_IMAP_HOST.to_string());
        let port = std::env::var("IMAP_PORT")
            .ok()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_IMAP_PORT);
        Self::new(&host, port, mailbox)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

/// Map a server's login rejection onto the distinguishable auth failures
pub fn classify_login_error(message: &str) -> MailboxError {
    let lower = message.to_lowercase();
    if lower.contains("application-specific password") || lower.contains("app password") {
        MailboxError::AppPasswordRequired
    } else if lower.contains("invalid credentials")
        || lower.contains("authenticationfailed")
        || lower.contains("authentication failed")
    {
        MailboxError::InvalidCredentials
    } else {
        MailboxError::Connection(message.to_string())
    }
}

fn connect(host: &str, port: u16, address: &str, secret: &str, mailbox: &str) -> Result<Session, MailboxError> {
    let client = ClientBuilder::new(host, port)
        .tls_kind(imap::TlsKind::Native)
        .mode(ConnectionMode::AutoTls)
        .connect()
        .map_err(|e| MailboxError::Connection(e.to_string()))?;

    let mut session = client
        .login(address, secret)
        .map_err(|(e, _client)| classify_login_error(&e.to_string()))?;

    session
        .examine(mailbox)
        .map_err(|e| MailboxError::Connection(format!("examine {}: {}", mailbox, e)))?;
    Ok(session)
}

#[async_trait]
impl MailSource for ImapMailSource {
    async fn authenticate(&mut self, address: &str, secret: &str) -> Result<(), MailboxError> {
        if self.session.is_connected() {
            self.close().await?;
        }
        let (host, port, mailbox) = (self.host.clone(), self.port, self.mailbox.clone());
        let (address, secret) = (address.to_string(), secret.to_string());

        debug!(host = %host, port, "Connecting to IMAP server");
        let session = tokio::task::spawn_blocking(move || {
            connect(&host, port, &address, &secret, &mailbox)
        })
        .await
        .map_err(|e| MailboxError::Connection(e.to_string()))??;

        self.session.put(session).await?;
        debug!(mailbox = %self.mailbox, "IMAP session ready");
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<String>, MailboxError> {
        let query = query.to_string();
        self.session.run(move |session| {
            let uids = session
                .uid_search(&query)
                .map_err(|e| MailboxError::Search(format!("{}: {}", query, e)))?;
            Ok(uids.into_iter().map(|uid| uid.to_string()).collect())
        })
        .await
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError> {
        let id = id.to_string();
        self.session.run(move |session| {
            let fetch_err = |reason: String| MailboxError::Fetch {
                id: id.clone(),
                reason,
            };
            let uid: u32 = id
                .parse()
                .map_err(|_| fetch_err("not a numeric UID".into()))?;
            let fetches = session
                .uid_fetch(uid.to_string(), FETCH_ITEMS)
                .map_err(|e| fetch_err(e.to_string()))?;
            let body = fetches
                .iter()
                .find_map(|f| f.body().map(|b| b.to_vec()))
                .ok_or_else(|| fetch_err("no body returned".into()))?;
            Ok(body)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), MailboxError> {
        let Some(mut session) = self.session.take().await? else {
            return Ok(());
        };
        let result = tokio::task::spawn_blocking(move || session.logout())
            .await
            .map_err(|e| MailboxError::Connection(e.to_string()))?;
        if let Err(e) = result {
            warn!(error = %e, "IMAP logout failed");
        }
        debug!("IMAP session closed");
        Ok(())
    }
}
