use crate::services::policy::PasswordViolation;
use crate::services::status::ApiStatus;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    InvalidArguments(String),

    #[error("Authorization failure")]
    AuthorizationFailure,

    #[error("Sign-in is not allowed for this account")]
    LoginNotAllowed,

    #[error("Email already used")]
    EmailAlreadyUsed,

    #[error("Invalid or already redeemed token")]
    InvalidToken,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Account already has a password")]
    UserAlreadyHasPassword,

    #[error("External login already associated with an account")]
    LoginAlreadyAssociated,

    #[error("Cannot remove the only remaining sign-in method")]
    RemoveLoginError,

    #[error("Password rejected by policy")]
    PasswordPolicy(Vec<PasswordViolation>),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidArguments(err.to_string())
    }
}

impl ServiceError {
    /// Translate to the boundary status vocabulary. Infrastructure errors
    /// collapse to `OperationFailed`; nothing else leaks.
    pub fn status(&self) -> ApiStatus {
        match self {
            ServiceError::Store(_) | ServiceError::Internal(_) | ServiceError::Notification(_) => {
                ApiStatus::OperationFailed
            }
            ServiceError::InvalidArguments(_) => ApiStatus::InvalidArguments,
            ServiceError::AuthorizationFailure => ApiStatus::AuthorizationFailure,
            ServiceError::LoginNotAllowed => ApiStatus::LoginNotAllowedError,
            ServiceError::EmailAlreadyUsed => ApiStatus::EmailAlreadyUsed,
            ServiceError::InvalidToken => ApiStatus::InvalidToken,
            ServiceError::IncorrectPassword => ApiStatus::IncorrectPassword,
            ServiceError::UserAlreadyHasPassword => ApiStatus::UserAlreadyHasPassword,
            ServiceError::LoginAlreadyAssociated => ApiStatus::LoginAlreadyAssociated,
            ServiceError::RemoveLoginError => ApiStatus::RemoveLoginError,
            ServiceError::PasswordPolicy(violations) => violations
                .first()
                .map(PasswordViolation::status)
                .unwrap_or(ApiStatus::InvalidArguments),
        }
    }
}

impl From<&ServiceError> for ApiStatus {
    fn from(err: &ServiceError) -> Self {
        err.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors_collapse() {
        let err = ServiceError::Internal(anyhow::anyhow!("pool exhausted"));
        assert_eq!(err.status(), ApiStatus::OperationFailed);

        let err = ServiceError::Store(StoreError::Conflict);
        assert_eq!(err.status(), ApiStatus::OperationFailed);
    }

    #[test]
    fn test_domain_errors_map_to_specific_codes() {
        assert_eq!(ServiceError::InvalidToken.status(), ApiStatus::InvalidToken);
        assert_eq!(
            ServiceError::RemoveLoginError.status(),
            ApiStatus::RemoveLoginError
        );
        assert_eq!(
            ServiceError::PasswordPolicy(vec![PasswordViolation::MissingDigit]).status(),
            ApiStatus::PasswordRequiresDigit
        );
    }
}
