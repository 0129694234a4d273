//! Contracts for the pieces the live update core calls out to but does not implement.

use crate::connection::ConnectionStatus;
use crate::error::Error;
use async_trait::async_trait;
use events::Page;
use log::*;

/// Supplies the short-lived credential attached to connection parameters.
///
/// `Ok(None)` means "signed out"; the connection proceeds unauthenticated. Errors are
/// treated the same way by the connection manager.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn current_credential(&self) -> Result<Option<String>, Error>;
}

/// No authentication collaborator present.
pub struct NoCredential;

#[async_trait]
impl CredentialProvider for NoCredential {
    async fn current_credential(&self) -> Result<Option<String>, Error> {
        Ok(None)
    }
}

/// A fixed token, e.g. supplied on the command line.
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn current_credential(&self) -> Result<Option<String>, Error> {
        Ok(Some(self.0.clone()))
    }
}

/// The page-side effects the core requests. Implementations decide how to render them.
pub trait Presentation: Send + Sync {
    /// A short-lived "this data may be stale" notice.
    fn show_transient_notice(&self, message: &str);

    /// Cosmetic status affordance: connecting, live, disconnected or failed.
    fn set_connection_status(&self, status: ConnectionStatus);

    /// Automatic recovery is exhausted. Shown once; the user has to reload.
    fn request_reload(&self, message: &str);

    /// Re-fetch whatever the given page shows.
    fn refresh_page_data(&self, page: Page);
}

/// Presentation for headless clients: everything goes to the log.
pub struct LogPresentation;

impl Presentation for LogPresentation {
    fn show_transient_notice(&self, message: &str) {
        info!("{message}");
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        info!("Connection status: {status}");
    }

    fn request_reload(&self, message: &str) {
        error!("{message}");
    }

    fn refresh_page_data(&self, page: Page) {
        info!("Refreshing data for page {page}");
    }
}
