mod common;

use account_core::dtos::{
    ForgotPasswordRequest, RegisterRequest, ResetPasswordRequest, SignInRequest,
};
use account_core::services::{
    AccountService, ApiStatus, EmailSender, ServiceError, SignInStatus,
};
use account_core::store::{AccountStore, ErrorLogStore, MemoryStore};
use async_trait::async_trait;
use common::{extract_param, harness, test_config, RecordingSessions, RecordingSmsOutbox};
use std::sync::Arc;

#[tokio::test]
async fn test_full_account_lifecycle() {
    let h = harness();

    // Register.
    let account = h
        .service
        .register(RegisterRequest {
            email: "a@x.com".to_string(),
            password: "Abcdef1!".to_string(),
            first_name: None,
            last_name: None,
            client_id: None,
        })
        .await
        .expect("registration succeeds");

    // A confirmation token went out.
    let mail = h.mailbox.last_for("a@x.com").expect("confirmation email");
    let confirm_token = extract_param(&mail.body, "code").expect("token in link");

    // Sign-in works before confirmation.
    let status = h
        .service
        .sign_in(SignInRequest {
            email: "a@x.com".to_string(),
            password: "Abcdef1!".to_string(),
            remember_me: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status.password_status(), ApiStatus::Ok);

    // Confirm the email; the token is single use.
    h.service
        .confirm_email(account.account_id, &confirm_token)
        .await
        .unwrap();
    let err = h
        .service
        .confirm_email(account.account_id, &confirm_token)
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::InvalidToken);

    // Request a reset; the caller learns nothing either way.
    h.service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap();
    let mail = h.mailbox.last_for("a@x.com").expect("reset email");
    let reset_token = extract_param(&mail.body, "code").expect("token in link");

    // Redeem it.
    h.service
        .reset_password(ResetPasswordRequest {
            email: "a@x.com".to_string(),
            token: reset_token.clone(),
            password: "Brandnew2@".to_string(),
        })
        .await
        .unwrap();

    // The same token a second time is dead.
    let err = h
        .service
        .reset_password(ResetPasswordRequest {
            email: "a@x.com".to_string(),
            token: reset_token,
            password: "Another3#x".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::InvalidToken);

    // And the new password signs in.
    let status = h
        .service
        .sign_in(SignInRequest {
            email: "a@x.com".to_string(),
            password: "Brandnew2@".to_string(),
            remember_me: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);
}

/// Email sender that always fails, to exercise the delivery-failure path.
struct BrokenMailbox;

#[async_trait]
impl EmailSender for BrokenMailbox {
    async fn send_email(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), ServiceError> {
        Err(ServiceError::Notification("smtp relay down".to_string()))
    }
}

#[tokio::test]
async fn test_registration_survives_notification_outage() {
    let store = Arc::new(MemoryStore::new());
    let sessions = Arc::new(RecordingSessions::default());
    let service = AccountService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(BrokenMailbox),
        Arc::new(RecordingSmsOutbox::default()),
        sessions.clone(),
        test_config(),
    );

    // Delivery failure is recorded, not surfaced.
    let account = service
        .register(RegisterRequest {
            email: "a@x.com".to_string(),
            password: "Abcdef1!".to_string(),
            first_name: None,
            last_name: None,
            client_id: None,
        })
        .await
        .expect("registration must not fail on a dead mail relay");
    assert_eq!(sessions.last_signed_in(), Some(account.account_id));

    let errors = ErrorLogStore::list(store.as_ref(), 0, 10).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].source.contains("send_confirmation"));

    // Same policy for the reset request path.
    let mut stored = store
        .find_by_id(account.account_id)
        .await
        .unwrap()
        .unwrap();
    stored.email_confirmed = true;
    AccountStore::update(store.as_ref(), &mut stored).await.unwrap();

    service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .expect("reset request must not fail on a dead mail relay");

    let errors = ErrorLogStore::list(store.as_ref(), 0, 10).await.unwrap();
    assert_eq!(errors.len(), 2);
}
