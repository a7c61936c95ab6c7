mod common;

use account_core::dtos::{
    ForgotPasswordRequest, RegisterRequest, ResetPasswordRequest, SignInRequest,
};
use account_core::services::{ApiStatus, SignInStatus};
use common::{extract_param, harness, Harness};

async fn register_confirmed(h: &Harness, email: &str, password: &str) -> uuid::Uuid {
    let account = h
        .service
        .register(RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: None,
            last_name: None,
            client_id: None,
        })
        .await
        .unwrap();

    let mail = h.mailbox.last_for(email).expect("confirmation email");
    let token = extract_param(&mail.body, "code").expect("confirmation token");
    h.service
        .confirm_email(account.account_id, &token)
        .await
        .expect("confirmation should succeed");
    account.account_id
}

async fn request_reset_token(h: &Harness, email: &str) -> String {
    h.service
        .forgot_password(ForgotPasswordRequest {
            email: email.to_string(),
        })
        .await
        .unwrap();
    let mail = h.mailbox.last_for(email).expect("reset email");
    assert_eq!(mail.subject, "Reset Password");
    extract_param(&mail.body, "code").expect("reset token")
}

fn reset_request(email: &str, token: &str, password: &str) -> ResetPasswordRequest {
    ResetPasswordRequest {
        email: email.to_string(),
        token: token.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_forgot_password_never_reveals_account_existence() {
    let h = harness();

    // Unknown account: success, nothing sent.
    h.service
        .forgot_password(ForgotPasswordRequest {
            email: "ghost@example.com".to_string(),
        })
        .await
        .unwrap();
    assert!(h.mailbox.last_for("ghost@example.com").is_none());

    // Unconfirmed account: success, nothing sent either.
    h.service
        .register(RegisterRequest {
            email: "fresh@example.com".to_string(),
            password: "Abcdef1!".to_string(),
            first_name: None,
            last_name: None,
            client_id: None,
        })
        .await
        .unwrap();
    let mails_before = h.mailbox.count();
    h.service
        .forgot_password(ForgotPasswordRequest {
            email: "fresh@example.com".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(h.mailbox.count(), mails_before);
}

#[tokio::test]
async fn test_reset_token_redeems_exactly_once() {
    let h = harness();
    register_confirmed(&h, "a@example.com", "Abcdef1!").await;
    let token = request_reset_token(&h, "a@example.com").await;

    h.service
        .reset_password(reset_request("a@example.com", &token, "Newpass1!"))
        .await
        .expect("first redemption should succeed");

    // Old password is gone, new one works.
    let status = h
        .service
        .sign_in(SignInRequest {
            email: "a@example.com".to_string(),
            password: "Abcdef1!".to_string(),
            remember_me: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Failure);
    let status = h
        .service
        .sign_in(SignInRequest {
            email: "a@example.com".to_string(),
            password: "Newpass1!".to_string(),
            remember_me: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);

    // Replaying the token fails with the specific token code.
    let err = h
        .service
        .reset_password(reset_request("a@example.com", &token, "Another1!"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::InvalidToken);
}

#[tokio::test]
async fn test_concurrent_redemptions_yield_one_success() {
    let h = harness();
    register_confirmed(&h, "a@example.com", "Abcdef1!").await;
    let token = request_reset_token(&h, "a@example.com").await;

    let first = h
        .service
        .reset_password(reset_request("a@example.com", &token, "Raceone1!"));
    let second = h
        .service
        .reset_password(reset_request("a@example.com", &token, "Racetwo1!"));

    let (first, second) = tokio::join!(first, second);
    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one redemption may win");

    let loser = if first.is_ok() { second } else { first };
    assert_eq!(loser.unwrap_err().status(), ApiStatus::InvalidToken);
}

#[tokio::test]
async fn test_reset_clears_lockout() {
    let h = harness();
    register_confirmed(&h, "a@example.com", "Abcdef1!").await;

    // Lock the account with bad attempts (threshold is 3 in tests).
    for _ in 0..3 {
        h.service
            .sign_in(SignInRequest {
                email: "a@example.com".to_string(),
                password: "Wrong1!aa".to_string(),
                remember_me: false,
                device_id: None,
            })
            .await
            .unwrap();
    }

    let token = request_reset_token(&h, "a@example.com").await;
    h.service
        .reset_password(reset_request("a@example.com", &token, "Newpass1!"))
        .await
        .unwrap();

    // The reset closed the lockout window.
    let status = h
        .service
        .sign_in(SignInRequest {
            email: "a@example.com".to_string(),
            password: "Newpass1!".to_string(),
            remember_me: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);
}

#[tokio::test]
async fn test_reset_for_unknown_account_reports_success() {
    let h = harness();
    // Anti-enumeration: redeeming against a missing account looks like a
    // success even though nothing happened.
    h.service
        .reset_password(reset_request("ghost@example.com", "whatever", "Newpass1!"))
        .await
        .expect("no account existence signal");
}

#[tokio::test]
async fn test_reset_rejects_policy_violations() {
    let h = harness();
    register_confirmed(&h, "a@example.com", "Abcdef1!").await;
    let token = request_reset_token(&h, "a@example.com").await;

    let err = h
        .service
        .reset_password(reset_request("a@example.com", &token, "weak"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::InvalidArguments);

    // The failed attempt did not burn the token.
    h.service
        .reset_password(reset_request("a@example.com", &token, "Newpass1!"))
        .await
        .unwrap();
}
