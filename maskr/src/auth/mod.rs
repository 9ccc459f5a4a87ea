//! Authentication module: signup, sign-in, password reset and sessions.
//!
//! - [`AuthManager`] runs the pre-authentication flows: the three-step email
//!   signup, email/password and OAuth sign-in, and the password reset.
//! - [`SessionManager`] refreshes, revokes and authenticates tokens.
//!
//! Every session token snapshots the user's `token_version`; a password reset
//! bumps it, which invalidates all refresh tokens issued before.
//!
//! ## Example
//!
//! ```no_run
//! use maskr::auth::{AuthManager, CreateAccountRequest};
//! # async fn example(auth: &AuthManager) -> Result<(), Box<dyn std::error::Error>> {
//! let pair = auth
//!     .create_account(&CreateAccountRequest {
//!         email: "alice@example.com".to_string(),
//!         code: "12345".to_string(),
//!         password: "Str0ng!Password".to_string(),
//!         captcha_token: "token".to_string(),
//!     })
//!     .await?;
//! println!("access token expires at {}", pair.access_token.expires_at);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod session;

pub use errors::{AuthError, AuthResult};
pub use manager::AuthManager;
pub use models::{
    AccountDetails, AuthMethod, CreateAccountRequest, LoginRequest, NewAccount,
    OAuthLoginRequest, PasswordResetConfirm, PasswordResetRequest, PasswordResetVerify, Provider,
    SignupOutcome, SignupRequest, User, UserId, VerifySignupRequest,
};
pub use session::SessionManager;
