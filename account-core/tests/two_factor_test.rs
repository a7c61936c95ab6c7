mod common;

use account_core::dtos::{RegisterRequest, SendCodeRequest, SignInRequest, VerifyCodeRequest};
use account_core::models::{ChallengeProvider, Principal};
use account_core::services::{ApiStatus, SignInStatus};
use common::{extract_code, harness, Harness};
use uuid::Uuid;

async fn seed_two_factor_account(h: &Harness, email: &str, password: &str) -> Principal {
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
    let principal = Principal::new(account.account_id, email);
    h.service.enable_two_factor(&principal).await.unwrap();
    principal
}

fn sign_in_request(email: &str, password: &str, device: Option<&str>) -> SignInRequest {
    SignInRequest {
        email: email.to_string(),
        password: password.to_string(),
        remember_me: true,
        device_id: device.map(str::to_string),
    }
}

async fn start_challenge(h: &Harness, email: &str, password: &str, device: Option<&str>) -> Uuid {
    match h
        .service
        .sign_in(sign_in_request(email, password, device))
        .await
        .unwrap()
    {
        SignInStatus::RequiresVerification { session_token } => session_token,
        other => panic!("expected a pending verification, got {:?}", other),
    }
}

async fn emailed_code(h: &Harness, session_token: Uuid, email: &str) -> String {
    h.service
        .send_code(SendCodeRequest {
            session_token,
            provider: ChallengeProvider::Email,
        })
        .await
        .unwrap();
    let mail = h.mailbox.last_for(email).expect("code email");
    extract_code(&mail.body).expect("numeric code in email body")
}

#[tokio::test]
async fn test_two_factor_round_trip() {
    let h = harness();
    seed_two_factor_account(&h, "a@example.com", "Abcdef1!").await;

    let session_token = start_challenge(&h, "a@example.com", "Abcdef1!", None).await;
    let code = emailed_code(&h, session_token, "a@example.com").await;

    let status = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token,
            code: code.clone(),
            remember_device: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);

    // The pending session is consumed: replaying the same code fails.
    let replay = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token,
            code,
            remember_device: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(replay, SignInStatus::Failure);
    assert_eq!(replay.code_status(), ApiStatus::InvalidVerificationCode);
}

#[tokio::test]
async fn test_wrong_codes_exhaust_budget_and_lock_account() {
    let h = harness();
    seed_two_factor_account(&h, "a@example.com", "Abcdef1!").await;

    let session_token = start_challenge(&h, "a@example.com", "Abcdef1!", None).await;
    emailed_code(&h, session_token, "a@example.com").await;

    for expected_attempts in 1..=2 {
        let status = h
            .service
            .verify_code(VerifyCodeRequest {
                session_token,
                code: format!("00000{}", expected_attempts),
                remember_device: false,
                device_id: None,
            })
            .await
            .unwrap();
        assert_eq!(status, SignInStatus::Failure);
    }

    let status = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token,
            code: "000003".to_string(),
            remember_device: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::LockedOut);

    // The exhaustion locked the account itself, not just the session.
    let status = h
        .service
        .sign_in(sign_in_request("a@example.com", "Abcdef1!", None))
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::LockedOut);
}

#[tokio::test]
async fn test_remembered_device_skips_second_factor() {
    let h = harness();
    seed_two_factor_account(&h, "a@example.com", "Abcdef1!").await;

    let session_token = start_challenge(&h, "a@example.com", "Abcdef1!", Some("laptop-1")).await;
    let code = emailed_code(&h, session_token, "a@example.com").await;

    let status = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token,
            code,
            remember_device: true,
            device_id: Some("laptop-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);

    // Same device goes straight through now.
    let status = h
        .service
        .sign_in(sign_in_request("a@example.com", "Abcdef1!", Some("laptop-1")))
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);

    // A different device still gets challenged.
    let status = h
        .service
        .sign_in(sign_in_request("a@example.com", "Abcdef1!", Some("laptop-2")))
        .await
        .unwrap();
    assert!(matches!(status, SignInStatus::RequiresVerification { .. }));
}

#[tokio::test]
async fn test_new_code_invalidates_previous_challenge() {
    let h = harness();
    seed_two_factor_account(&h, "a@example.com", "Abcdef1!").await;

    let first_session = start_challenge(&h, "a@example.com", "Abcdef1!", None).await;
    let first_code = emailed_code(&h, first_session, "a@example.com").await;

    let second_session = start_challenge(&h, "a@example.com", "Abcdef1!", None).await;
    let second_code = emailed_code(&h, second_session, "a@example.com").await;

    // The earlier challenge died when the new code was issued.
    let status = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token: first_session,
            code: first_code,
            remember_device: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Failure);

    let status = h
        .service
        .verify_code(VerifyCodeRequest {
            session_token: second_session,
            code: second_code,
            remember_device: false,
            device_id: None,
        })
        .await
        .unwrap();
    assert_eq!(status, SignInStatus::Success);
}

#[tokio::test]
async fn test_send_code_over_sms_requires_confirmed_phone() {
    let h = harness();
    seed_two_factor_account(&h, "a@example.com", "Abcdef1!").await;

    let session_token = start_challenge(&h, "a@example.com", "Abcdef1!", None).await;
    let err = h
        .service
        .send_code(SendCodeRequest {
            session_token,
            provider: ChallengeProvider::Sms,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::InvalidArguments);
}

#[tokio::test]
async fn test_send_code_for_unknown_session_fails_closed() {
    let h = harness();
    let err = h
        .service
        .send_code(SendCodeRequest {
            session_token: Uuid::new_v4(),
            provider: ChallengeProvider::Email,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), ApiStatus::AuthorizationFailure);
}
