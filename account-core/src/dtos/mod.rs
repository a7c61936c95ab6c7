//! Request payloads accepted at the service boundary.
//!
//! Shape validation happens here, before any state is touched; failures
//! map to `InvalidArguments`.

use crate::models::{ChallengeProvider, Role};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    /// Opaque client identifier used for the remembered-device exemption.
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendCodeRequest {
    pub session_token: Uuid,
    pub provider: ChallengeProvider,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    pub session_token: Uuid,
    #[validate(length(min = 4))]
    pub code: String,
    #[serde(default)]
    pub remember_device: bool,
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPasswordRequest {
    #[validate(length(min = 1))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExternalConfirmationRequest {
    #[validate(email)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPhoneRequest {
    #[validate(length(min = 5, max = 20))]
    pub number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPhoneRequest {
    #[validate(length(min = 5, max = 20))]
    pub number: String,
    #[validate(length(min = 4))]
    pub code: String,
}

/// Administrative account creation; the caller's managed-role set clamps
/// `roles` before anything is applied.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(email)]
    pub email: String,
    pub roles: Vec<Role>,
    pub client_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
