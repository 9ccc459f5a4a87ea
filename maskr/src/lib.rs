//! # Maskr
//!
//! Account, session and mask management core for an email-masking relay.
//!
//! Users register with a verified email address (or an OAuth identity), attach
//! further verified addresses to their account, and create *masks*: disposable
//! addresses that forward to one of those verified addresses. A separate lookup
//! path resolves masks for the mail-processing pipeline.
//!
//! ## Core Modules
//!
//! - [`token`]: JWT access, refresh and password-reset tokens
//! - [`verification`]: one-time code generation and the code lifecycle
//! - [`security`]: credential hashing, password policy, rate limiting, revocation
//! - [`auth`]: signup, login, OAuth sign-in, password reset and session flows
//! - [`emails`]: verified forwarding addresses owned by a user
//! - [`masks`]: mask management and mask resolution
//! - [`domains`]: the periodically refreshed domain allow-list
//! - [`db`]: repository traits with PostgreSQL and in-memory implementations
//! - [`kv`]: the expiring key-value store behind rate limits and revocations
//!
//! External collaborators live behind traits in [`mailer`], [`captcha`] and
//! [`oauth`], each with a production and a local implementation.

pub mod auth;
pub mod captcha;
pub mod db;
pub mod domains;
pub mod emails;
pub mod kv;
pub mod mailer;
pub mod masks;
pub mod oauth;
pub mod security;
pub mod token;
pub mod verification;

pub use auth::{AuthManager, AuthMethod, SessionManager, User, UserId};
pub use domains::{Domain, DomainCache};
pub use emails::EmailManager;
pub use masks::{MaskLookup, MaskManager};
pub use token::{TokenPair, TokenService, TokenType};
