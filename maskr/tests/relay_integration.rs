//! Integration tests for the account, email and mask flows.
//!
//! Everything runs against the in-memory store and key-value store.

use maskr::auth::{
    AuthError, CreateAccountRequest, LoginRequest, PasswordResetConfirm, PasswordResetRequest,
    PasswordResetVerify, SignupRequest, VerifySignupRequest,
};
use maskr::captcha::DisabledCaptcha;
use maskr::db::{MemoryStore, UserRepository, VerificationRepository};
use maskr::emails::EmailError;
use maskr::kv::MemoryKeyValueStore;
use maskr::mailer::{MailKind, RecordingMailer};
use maskr::masks::{AddMaskRequest, LookupError, MaskError};
use maskr::security::{CredentialHasher, RevocationLedger};
use maskr::token::TokenSettings;
use maskr::verification::VerificationError;
use maskr::{
    AuthManager, DomainCache, EmailManager, MaskLookup, MaskManager, SessionManager, TokenPair,
    TokenService, TokenType, UserId,
};
use std::sync::Arc;

const PASSWORD: &str = "Correct-Horse-42";
const NEW_PASSWORD: &str = "Brand-New-Pass7";

struct Relay {
    auth: AuthManager,
    sessions: SessionManager,
    emails: EmailManager,
    masks: MaskManager,
    lookup: MaskLookup,
    tokens: TokenService,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
}

async fn setup() -> Relay {
    let store = Arc::new(MemoryStore::new());
    store.insert_domain("mask.io", true).await;
    store.insert_domain("relay.dev", false).await;
    let domains = Arc::new(DomainCache::load(store.clone()).await.unwrap());

    let kv = Arc::new(MemoryKeyValueStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let hasher = CredentialHasher::with_params(1024, 1, 1).unwrap();
    let tokens = TokenService::new(
        "relay_integration_secret_long_enough_hs256",
        TokenSettings::default(),
    );

    Relay {
        auth: AuthManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            tokens.clone(),
            hasher.clone(),
            mailer.clone(),
            Arc::new(DisabledCaptcha),
        ),
        sessions: SessionManager::new(store.clone(), tokens.clone(), RevocationLedger::new(kv)),
        emails: EmailManager::new(
            store.clone(),
            store.clone(),
            domains.clone(),
            hasher,
            mailer.clone(),
        ),
        masks: MaskManager::new(store.clone(), store.clone(), domains.clone()),
        lookup: MaskLookup::new(store.clone(), domains),
        tokens,
        store,
        mailer,
    }
}

fn signup_request(email: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        captcha_token: "ok".to_string(),
    }
}

/// Request, check and redeem a signup code
async fn register(relay: &Relay, email: &str) -> (UserId, TokenPair) {
    relay.auth.request_signup(&signup_request(email)).await.unwrap();
    let code = relay
        .mailer
        .last_code(MailKind::AccountCode, &email.to_lowercase())
        .await
        .unwrap();

    relay
        .auth
        .verify_signup_code(&VerifySignupRequest {
            email: email.to_string(),
            code: code.clone(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap();

    let pair = relay
        .auth
        .create_account(&CreateAccountRequest {
            email: email.to_string(),
            code,
            password: PASSWORD.to_string(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap();

    let user_id = relay
        .tokens
        .validate(&pair.access_token.token, TokenType::Access)
        .unwrap()
        .id;
    (user_id, pair)
}

#[tokio::test]
async fn test_full_signup_and_login_flow() {
    let relay = setup().await;
    let (user_id, pair) = register(&relay, "Alice@Example.com").await;

    let claims = relay.sessions.authenticate(&pair.access_token.token).unwrap();
    assert_eq!(claims.id, user_id);

    let details = relay.auth.account_details(user_id).await.unwrap();
    assert_eq!(details.email, "alice@example.com");

    let login = relay
        .auth
        .sign_in_with_email(&LoginRequest {
            email: "alice@example.com".to_string(),
            password: PASSWORD.to_string(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap();
    assert!(relay.sessions.refresh(&login.refresh_token.token).await.is_ok());

    // The primary address is verified at creation
    let emails = relay.emails.list(user_id).await.unwrap();
    assert_eq!(emails.len(), 1);
    assert!(emails[0].is_primary);
    assert!(emails[0].is_verified);
}

#[tokio::test]
async fn test_codes_are_stored_hashed() {
    let relay = setup().await;
    relay
        .auth
        .request_signup(&signup_request("bob@example.com"))
        .await
        .unwrap();
    let code = relay
        .mailer
        .last_code(MailKind::AccountCode, "bob@example.com")
        .await
        .unwrap();

    let stored = relay
        .store
        .find_account_code("bob@example.com")
        .await
        .unwrap()
        .unwrap();

    assert_ne!(stored.code_hash, code);
    assert!(!stored.code_hash.contains(&code));
    assert!(stored.code_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn test_signup_code_is_single_use() {
    let relay = setup().await;
    relay
        .auth
        .request_signup(&signup_request("carol@example.com"))
        .await
        .unwrap();
    let code = relay
        .mailer
        .last_code(MailKind::AccountCode, "carol@example.com")
        .await
        .unwrap();
    let request = CreateAccountRequest {
        email: "carol@example.com".to_string(),
        code,
        password: PASSWORD.to_string(),
        captcha_token: "ok".to_string(),
    };

    relay.auth.create_account(&request).await.unwrap();
    let err = relay.auth.create_account(&request).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Verification(VerificationError::NotFound)
    ));
}

#[tokio::test]
async fn test_mask_requires_verified_forward_address() {
    let relay = setup().await;
    let (user_id, _) = register(&relay, "dave@example.com").await;

    relay.emails.add(user_id, "dave.work@example.org").await.unwrap();

    let request = AddMaskRequest {
        name: "newsletters".to_string(),
        domain: "mask.io".to_string(),
        email: "dave.work@example.org".to_string(),
    };
    let err = relay.masks.add(user_id, &request).await.unwrap_err();
    assert!(matches!(err, MaskError::EmailNotVerified));

    let code = relay
        .mailer
        .last_code(MailKind::EmailVerification, "dave.work@example.org")
        .await
        .unwrap();
    relay
        .emails
        .verify(user_id, "dave.work@example.org", &code)
        .await
        .unwrap();

    let mask = relay.masks.add(user_id, &request).await.unwrap();
    assert_eq!(mask.mask, "newsletters@mask.io");

    let target = relay.lookup.get_mask("newsletters@mask.io").await.unwrap();
    assert_eq!(target.email, "dave.work@example.org");
    assert!(target.enabled);

    relay
        .lookup
        .increment_forwarded_count("newsletters@mask.io")
        .await
        .unwrap();
    relay
        .lookup
        .increment_received_count("newsletters@mask.io")
        .await
        .unwrap();

    let listed = relay.masks.list(user_id).await.unwrap();
    assert_eq!(listed[0].messages_forwarded, 1);
    assert_eq!(listed[0].messages_received, 2);

    // The forward address cannot go while a mask points at it
    let err = relay
        .emails
        .delete(user_id, "dave.work@example.org")
        .await
        .unwrap_err();
    assert!(matches!(err, EmailError::HasMasks));

    relay.masks.delete(user_id, "newsletters@mask.io").await.unwrap();
    relay
        .emails
        .delete(user_id, "dave.work@example.org")
        .await
        .unwrap();

    let err = relay.lookup.check_mask("newsletters@mask.io").await.unwrap_err();
    assert!(matches!(err, LookupError::NotFound));
}

#[tokio::test]
async fn test_mask_address_is_global() {
    let relay = setup().await;
    let (first, _) = register(&relay, "erin@example.com").await;
    let (second, _) = register(&relay, "frank@example.com").await;

    relay
        .masks
        .add(
            first,
            &AddMaskRequest {
                name: "shared".to_string(),
                domain: "relay.dev".to_string(),
                email: "erin@example.com".to_string(),
            },
        )
        .await
        .unwrap();

    let err = relay
        .masks
        .add(
            second,
            &AddMaskRequest {
                name: "SHARED".to_string(),
                domain: "Relay.dev".to_string(),
                email: "frank@example.com".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MaskError::AlreadyExists));

    // Another user's mask cannot be toggled
    let err = relay
        .masks
        .set_status(second, "shared@relay.dev", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MaskError::MaskNotOwned));
}

#[tokio::test]
async fn test_password_reset_invalidates_sessions() {
    let relay = setup().await;
    let (user_id, pair) = register(&relay, "grace@example.com").await;

    relay
        .auth
        .request_password_reset(&PasswordResetRequest {
            email: "grace@example.com".to_string(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap();
    let code = relay
        .mailer
        .last_code(MailKind::PasswordReset, "grace@example.com")
        .await
        .unwrap();
    assert_eq!(code.len(), 6);

    let verify = PasswordResetVerify {
        email: "grace@example.com".to_string(),
        code,
        captcha_token: "ok".to_string(),
    };
    let reset_token = relay.auth.verify_password_reset(&verify).await.unwrap();

    // The code is consumed by the first exchange
    let err = relay.auth.verify_password_reset(&verify).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Verification(VerificationError::NotFound)
    ));

    let confirm = PasswordResetConfirm {
        token: reset_token,
        password: NEW_PASSWORD.to_string(),
        captcha_token: "ok".to_string(),
    };
    relay.auth.confirm_password_reset(&confirm).await.unwrap();

    let user = relay.store.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.token_version, 2);

    let err = relay
        .sessions
        .refresh(&pair.refresh_token.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenVersionMismatch));

    // The reset token itself is now stale
    let err = relay.auth.confirm_password_reset(&confirm).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenVersionMismatch));

    let err = relay
        .auth
        .sign_in_with_email(&LoginRequest {
            email: "grace@example.com".to_string(),
            password: PASSWORD.to_string(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IncorrectLogin));

    relay
        .auth
        .sign_in_with_email(&LoginRequest {
            email: "grace@example.com".to_string(),
            password: NEW_PASSWORD.to_string(),
            captcha_token: "ok".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_revoked_refresh_token_stays_revoked() {
    let relay = setup().await;
    let (_, pair) = register(&relay, "heidi@example.com").await;

    assert!(relay.sessions.revoke(&pair.refresh_token.token).await.unwrap());

    let err = relay
        .sessions
        .refresh(&pair.refresh_token.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked));

    // Access tokens are not affected until they expire
    assert!(relay.sessions.authenticate(&pair.access_token.token).is_ok());
}

#[tokio::test]
async fn test_email_code_is_single_use() {
    let relay = setup().await;
    let (user_id, _) = register(&relay, "ivan@example.com").await;
    relay.emails.add(user_id, "ivan@example.net").await.unwrap();
    let code = relay
        .mailer
        .last_code(MailKind::EmailVerification, "ivan@example.net")
        .await
        .unwrap();

    relay
        .emails
        .verify(user_id, "ivan@example.net", &code)
        .await
        .unwrap();
    let err = relay
        .emails
        .verify(user_id, "ivan@example.net", &code)
        .await
        .unwrap_err();

    assert!(matches!(err, EmailError::AlreadyVerified));
}

#[tokio::test]
async fn test_mask_domain_cannot_be_forward_address() {
    let relay = setup().await;
    let (user_id, _) = register(&relay, "judy@example.com").await;

    let err = relay.emails.add(user_id, "loop@mask.io").await.unwrap_err();

    assert!(matches!(err, EmailError::MaskDomain));
}
