//! ZeptoMail template API client.

use super::{MailKind, Mailer, MailerError, MailerResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Template send endpoint
pub const ZEPTO_TEMPLATE_URL: &str = "https://api.zeptomail.eu/v1.1/email/template";

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// ZeptoMail account settings
#[derive(Debug, Clone)]
pub struct ZeptoConfig {
    /// Send-mail token (sent as `Zoho-enczapikey <token>`)
    pub token: String,
    pub template_key: String,
    pub from_address: String,
    pub bounce_address: String,
}

#[derive(Serialize)]
struct TemplateRequest<'a> {
    mail_template_key: &'a str,
    bounce_address: &'a str,
    from: Address<'a>,
    to: [Recipient<'a>; 1],
    merge_info: MergeInfo<'a>,
}

#[derive(Serialize)]
struct Address<'a> {
    address: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct Recipient<'a> {
    email_address: Address<'a>,
}

#[derive(Serialize)]
struct MergeInfo<'a> {
    code: &'a str,
}

/// Sends codes through a ZeptoMail template
#[derive(Debug, Clone)]
pub struct ZeptoMailer {
    client: reqwest::Client,
    config: ZeptoConfig,
    endpoint: String,
}

impl ZeptoMailer {
    pub fn new(config: ZeptoConfig) -> MailerResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            config,
            endpoint: ZEPTO_TEMPLATE_URL.to_string(),
        })
    }

    /// Point the client at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn body<'a>(&'a self, to: &'a str, code: &'a str) -> TemplateRequest<'a> {
        TemplateRequest {
            mail_template_key: &self.config.template_key,
            bounce_address: &self.config.bounce_address,
            from: Address {
                address: &self.config.from_address,
                name: "no-reply",
            },
            to: [Recipient {
                email_address: Address {
                    address: to,
                    name: to,
                },
            }],
            merge_info: MergeInfo { code },
        }
    }

    async fn post_once(&self, body: &TemplateRequest<'_>) -> MailerResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Zoho-enczapikey {}", self.config.token),
            )
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailerError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Transport failures, throttling and server errors are worth another attempt
fn is_retryable(err: &MailerError) -> bool {
    match err {
        MailerError::Transport(_) => true,
        MailerError::Rejected { status, .. } => *status == 429 || *status >= 500,
    }
}

#[async_trait]
impl Mailer for ZeptoMailer {
    async fn send(&self, kind: MailKind, to: &str, code: &str) -> MailerResult<()> {
        let body = self.body(to, code);
        let mut attempt = 0;

        loop {
            match self.post_once(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                    attempt += 1;
                    log::warn!(
                        "Mail delivery ({:?}) failed, retry {}/{}: {}",
                        kind,
                        attempt,
                        MAX_RETRIES,
                        e
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
