//! Mailer that keeps sent codes in memory.

use super::{MailKind, Mailer, MailerResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// A captured message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub kind: MailKind,
    pub to: String,
    pub code: String,
}

/// Records every message; can be switched to fail delivery
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with a provider rejection
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }

    /// Most recent code of `kind` sent to `to`
    pub async fn last_code(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, kind: MailKind, to: &str, code: &str) -> MailerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(super::MailerError::Rejected {
                status: 503,
                body: "delivery disabled".to_string(),
            });
        }

        self.sent.lock().await.push(SentMail {
            kind,
            to: to.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_code_picks_latest_matching() {
        let mailer = RecordingMailer::new();
        mailer.send_code("a@example.com", "11111").await.unwrap();
        mailer.send_code("a@example.com", "22222").await.unwrap();
        mailer.send_password_code("a@example.com", "333333").await.unwrap();

        assert_eq!(
            mailer.last_code(MailKind::AccountCode, "a@example.com").await.as_deref(),
            Some("22222")
        );
        assert_eq!(
            mailer.last_code(MailKind::PasswordReset, "a@example.com").await.as_deref(),
            Some("333333")
        );
        assert!(mailer.last_code(MailKind::EmailVerification, "a@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_failing_mailer_records_nothing() {
        let mailer = RecordingMailer::new();
        mailer.set_failing(true);

        assert!(mailer.send_code("a@example.com", "11111").await.is_err());
        assert!(mailer.sent().await.is_empty());
    }
}
