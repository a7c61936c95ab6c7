//! Password policy validation.

use crate::config::PasswordPolicy;
use crate::services::status::ApiStatus;

/// Specific ways a proposed password can violate the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort { min_length: usize },
    MissingDigit,
    MissingLowercase,
    MissingUppercase,
    MissingNonAlphanumeric,
}

impl PasswordViolation {
    pub fn status(&self) -> ApiStatus {
        match self {
            PasswordViolation::TooShort { .. } => ApiStatus::InvalidArguments,
            PasswordViolation::MissingDigit => ApiStatus::PasswordRequiresDigit,
            PasswordViolation::MissingLowercase => ApiStatus::PasswordRequiresLowerCharacters,
            PasswordViolation::MissingUppercase => ApiStatus::PasswordRequiresUpperCharacters,
            PasswordViolation::MissingNonAlphanumeric => {
                ApiStatus::PasswordRequiresNonAlphanumericCharacters
            }
        }
    }
}

impl std::fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordViolation::TooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PasswordViolation::MissingDigit => {
                write!(f, "Password must contain at least one digit")
            }
            PasswordViolation::MissingLowercase => {
                write!(f, "Password must contain at least one lower case letter")
            }
            PasswordViolation::MissingUppercase => {
                write!(f, "Password must contain at least one upper case letter")
            }
            PasswordViolation::MissingNonAlphanumeric => {
                write!(f, "Password must contain at least one non-alphanumeric character")
            }
        }
    }
}

/// Validate a proposed password against the configured policy, collecting
/// every violation rather than stopping at the first.
pub fn validate_password(password: &str, policy: &PasswordPolicy) -> Vec<PasswordViolation> {
    let mut violations = Vec::new();

    if password.chars().count() < policy.min_length {
        violations.push(PasswordViolation::TooShort {
            min_length: policy.min_length,
        });
    }

    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordViolation::MissingDigit);
    }

    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        violations.push(PasswordViolation::MissingLowercase);
    }

    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        violations.push(PasswordViolation::MissingUppercase);
    }

    if policy.require_non_alphanumeric && password.chars().all(|c| c.is_alphanumeric()) {
        violations.push(PasswordViolation::MissingNonAlphanumeric);
    }

    violations
}
