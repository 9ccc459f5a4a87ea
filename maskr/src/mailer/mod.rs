//! Outbound verification mail.
//!
//! Every message carries a single one-time code; [`MailKind`] selects which flow it
//! belongs to. [`ZeptoMailer`] talks to the ZeptoMail template API,
//! [`ConsoleMailer`] logs codes for local development and [`RecordingMailer`]
//! keeps them in memory for tests.

use async_trait::async_trait;
use thiserror::Error;

pub mod console;
pub mod recording;
pub mod zepto;

pub use console::ConsoleMailer;
pub use recording::{RecordingMailer, SentMail};
pub use zepto::{ZeptoConfig, ZeptoMailer};

/// Which flow a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailKind {
    /// Signup code for a new account
    AccountCode,
    /// Ownership code for an email added to an account
    EmailVerification,
    /// Password-reset code
    PasswordReset,
}

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailerError {
    /// Request could not be sent or no response arrived
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Mail provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Result type for mail delivery
pub type MailerResult<T> = Result<T, MailerError>;

/// Delivers one-time codes by email
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `code` to `to`
    async fn send(&self, kind: MailKind, to: &str, code: &str) -> MailerResult<()>;

    /// Signup code
    async fn send_code(&self, to: &str, code: &str) -> MailerResult<()> {
        self.send(MailKind::AccountCode, to, code).await
    }

    /// Code for an email being added to an account
    async fn send_verification(&self, to: &str, code: &str) -> MailerResult<()> {
        self.send(MailKind::EmailVerification, to, code).await
    }

    /// Password-reset code
    async fn send_password_code(&self, to: &str, code: &str) -> MailerResult<()> {
        self.send(MailKind::PasswordReset, to, code).await
    }
}
