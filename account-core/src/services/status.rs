//! Fixed status vocabulary emitted across the crate boundary.
//!
//! Every operation terminates in one of these codes; no internal error
//! detail crosses upward.

use serde::Serialize;

const RANGE_GENERIC: u32 = 0x0;
const RANGE_ACCOUNT: u32 = 0x1000_0000;

/// Status codes for account-layer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    /// Successful operation.
    Ok,
    /// Generic operation failure.
    OperationFailed,
    /// Invalid parameters passed to the operation.
    InvalidArguments,
    /// Account is locked out.
    AccountLockedOut,
    /// Additional verification is required to finish signing in.
    AccountRequiresVerification,
    /// Invalid authorization parameters passed.
    AuthorizationFailure,
    /// Invalid verification code given.
    InvalidVerificationCode,
    /// Registration failed.
    RegistrationFailed,
    /// Removing an associated login from the account failed.
    RemoveLoginError,
    /// Sign-in for this account is disallowed.
    LoginNotAllowedError,
    /// The account already has a password.
    UserAlreadyHasPassword,
    /// Invalid or already redeemed token.
    InvalidToken,
    /// Password mismatch.
    IncorrectPassword,
    /// Password does not contain a numeric character required by policy.
    PasswordRequiresDigit,
    /// Password does not contain a lower case letter required by policy.
    PasswordRequiresLowerCharacters,
    /// Password does not contain a non-alphanumeric character required by policy.
    PasswordRequiresNonAlphanumericCharacters,
    /// Password does not contain an upper case letter required by policy.
    PasswordRequiresUpperCharacters,
    /// External login is already associated with an account.
    LoginAlreadyAssociated,
    /// Email is already used by another account.
    EmailAlreadyUsed,
}

impl ApiStatus {
    /// Stable numeric code for wire formats that predate the symbolic names.
    pub fn code(&self) -> u32 {
        match self {
            ApiStatus::Ok => RANGE_GENERIC,
            ApiStatus::OperationFailed => RANGE_GENERIC + 1,
            ApiStatus::InvalidArguments => RANGE_GENERIC + 2,
            ApiStatus::AccountLockedOut => RANGE_ACCOUNT + 1,
            ApiStatus::AccountRequiresVerification => RANGE_ACCOUNT + 2,
            ApiStatus::AuthorizationFailure => RANGE_ACCOUNT + 3,
            ApiStatus::InvalidVerificationCode => RANGE_ACCOUNT + 4,
            ApiStatus::RegistrationFailed => RANGE_ACCOUNT + 5,
            ApiStatus::RemoveLoginError => RANGE_ACCOUNT + 6,
            ApiStatus::LoginNotAllowedError => RANGE_ACCOUNT + 7,
            ApiStatus::UserAlreadyHasPassword => RANGE_ACCOUNT + 8,
            ApiStatus::InvalidToken => RANGE_ACCOUNT + 9,
            ApiStatus::IncorrectPassword => RANGE_ACCOUNT + 10,
            ApiStatus::PasswordRequiresDigit => RANGE_ACCOUNT + 11,
            ApiStatus::PasswordRequiresLowerCharacters => RANGE_ACCOUNT + 12,
            ApiStatus::PasswordRequiresNonAlphanumericCharacters => RANGE_ACCOUNT + 13,
            ApiStatus::PasswordRequiresUpperCharacters => RANGE_ACCOUNT + 14,
            ApiStatus::LoginAlreadyAssociated => RANGE_ACCOUNT + 15,
            ApiStatus::EmailAlreadyUsed => RANGE_ACCOUNT + 16,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ApiStatus::Ok)
    }
}

/// Response envelope returned by the boundary layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub code: ApiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl StatusResponse {
    pub fn new(code: ApiStatus) -> Self {
        Self { code, errors: None }
    }

    pub fn with_errors(code: ApiStatus, errors: Vec<String>) -> Self {
        Self {
            code,
            errors: Some(errors),
        }
    }
}
