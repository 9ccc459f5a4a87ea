//! Mailer that writes codes to the log.

use super::{MailKind, Mailer, MailerResult};
use async_trait::async_trait;

/// Logs every code instead of sending it; development only
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, kind: MailKind, to: &str, code: &str) -> MailerResult<()> {
        log::info!("[mail] {:?} code for {}: {}", kind, to, code);
        Ok(())
    }
}
