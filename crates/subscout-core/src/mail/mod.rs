//! Mailbox access
//!
//! [`MailSource`] is the boundary the ingestor works against: authenticate,
//! search, fetch raw bytes, close. [`ImapMailSource`] is the real
//! implementation; [`MockMailSource`] serves canned messages for tests and
//! offline runs.

mod imap;
mod mock;

pub use self::imap::{classify_login_error, ImapMailSource, DEFAULT_IMAP_HOST, DEFAULT_IMAP_PORT};
pub use self::mock::MockMailSource;

use async_trait::async_trait;

use crate::error::MailboxError;

/// A mailbox the ingestor can search and fetch from.
///
/// Implementations hold one connection; callers serialize access to it.
#[async_trait]
pub trait MailSource: Send {
    /// Log in; the three auth outcomes map to distinct `MailboxError` variants
    async fn authenticate(&mut self, address: &str, secret: &str) -> Result<(), MailboxError>;

    /// Run one IMAP-syntax search (`FROM "x"`, `SUBJECT "x"`, `BODY "x"`)
    async fn search(&mut self, query: &str) -> Result<Vec<String>, MailboxError>;

    /// Raw RFC 822 bytes of one message
    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError>;

    /// Log out and drop the connection; a no-op when not connected
    async fn close(&mut self) -> Result<(), MailboxError>;
}
