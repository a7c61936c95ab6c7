//! Session lifecycle controller: the top-level account state machine.
//!
//! Drives the credential verifier and the challenge manager, owns the
//! registration / password-reset / external-login flows, and talks to the
//! store, notification and session collaborators.

use crate::config::CoreConfig;
use crate::dtos::{
    AddPhoneRequest, ChangePasswordRequest, ExternalConfirmationRequest, ForgotPasswordRequest,
    RegisterRequest, ResetPasswordRequest, SendCodeRequest, SetPasswordRequest, SignInRequest,
    VerifyCodeRequest, VerifyPhoneRequest,
};
use crate::models::{
    Account, AccountSummary, ChallengeProvider, ErrorRecord, ExternalAssertion, ExternalLogin,
    Principal, SecurityToken, TokenPurpose,
};
use crate::services::challenge::{ChallengeManager, ChallengeOutcome, RememberedDevices};
use crate::services::credentials::{CredentialVerifier, Verification};
use crate::services::error::ServiceError;
use crate::services::notify::{EmailSender, SmsSender};
use crate::services::policy::validate_password;
use crate::services::session::SessionIssuer;
use crate::services::status::ApiStatus;
use crate::store::{
    AccountStore, ErrorLogStore, ExternalLoginStore, StoreError, TokenStore,
};
use crate::utils::{generate_numeric_code, generate_token, hash_password, token_digest,
    verify_password, Password, PasswordHashString};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const MAX_UPDATE_RETRIES: u32 = 3;

/// Result of a sign-in step.
#[derive(Debug, PartialEq, Eq)]
pub enum SignInStatus {
    Success,
    LockedOut,
    /// A second factor is outstanding; present the session token back with
    /// a code to finish.
    RequiresVerification { session_token: Uuid },
    Failure,
}

impl SignInStatus {
    /// Boundary status for the password step.
    pub fn password_status(&self) -> ApiStatus {
        match self {
            SignInStatus::Success => ApiStatus::Ok,
            SignInStatus::LockedOut => ApiStatus::AccountLockedOut,
            SignInStatus::RequiresVerification { .. } => ApiStatus::AccountRequiresVerification,
            SignInStatus::Failure => ApiStatus::AuthorizationFailure,
        }
    }

    /// Boundary status for the code-verification step.
    pub fn code_status(&self) -> ApiStatus {
        match self {
            SignInStatus::Success => ApiStatus::Ok,
            SignInStatus::LockedOut => ApiStatus::AccountLockedOut,
            SignInStatus::RequiresVerification { .. } => ApiStatus::AccountRequiresVerification,
            SignInStatus::Failure => ApiStatus::InvalidVerificationCode,
        }
    }
}

/// Result of an external-provider sign-in attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ExternalSignInStatus {
    Success,
    LockedOut,
    /// The assertion matches no linked login; the caller must run the
    /// confirmation step to claim an email and create the link.
    RequiresConfirmation,
}

pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    logins: Arc<dyn ExternalLoginStore>,
    tokens: Arc<dyn TokenStore>,
    error_log: Arc<dyn ErrorLogStore>,
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    sessions: Arc<dyn SessionIssuer>,
    verifier: CredentialVerifier,
    challenges: ChallengeManager,
    devices: Arc<RememberedDevices>,
    config: CoreConfig,
}

impl AccountService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        logins: Arc<dyn ExternalLoginStore>,
        tokens: Arc<dyn TokenStore>,
        error_log: Arc<dyn ErrorLogStore>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
        sessions: Arc<dyn SessionIssuer>,
        config: CoreConfig,
    ) -> Self {
        let devices = Arc::new(RememberedDevices::new());
        let verifier = CredentialVerifier::new(
            accounts.clone(),
            devices.clone(),
            config.lockout.clone(),
        );
        let challenges = ChallengeManager::new(config.challenge.clone());
        Self {
            accounts,
            logins,
            tokens,
            error_log,
            email,
            sms,
            sessions,
            verifier,
            challenges,
            devices,
            config,
        }
    }

    // ---- sign-in ---------------------------------------------------------

    pub async fn sign_in(&self, req: SignInRequest) -> Result<SignInStatus, ServiceError> {
        req.validate()?;

        match self
            .verifier
            .verify(&req.email, &req.password, req.device_id.as_deref())
            .await?
        {
            Verification::Success(account) => {
                self.sessions.sign_in(&account, req.remember_me).await?;
                tracing::info!(account_id = %account.account_id, "Signed in");
                Ok(SignInStatus::Success)
            }
            Verification::LockedOut => Ok(SignInStatus::LockedOut),
            Verification::RequiresTwoFactor(account) => {
                let session_token = self.challenges.begin(account.account_id, req.remember_me);
                Ok(SignInStatus::RequiresVerification { session_token })
            }
            Verification::Failure => Ok(SignInStatus::Failure),
        }
    }

    /// Generate and deliver a one-time code for a pending session.
    pub async fn send_code(&self, req: SendCodeRequest) -> Result<(), ServiceError> {
        req.validate()?;

        let issued = self
            .challenges
            .issue_code(req.session_token, req.provider)
            .ok_or(ServiceError::AuthorizationFailure)?;

        let account = self
            .accounts
            .find_by_id(issued.account_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let text = format!("Your security code is: {}", issued.code);
        match issued.provider {
            ChallengeProvider::Email => {
                self.email
                    .send_email(&account.email, "Security code", &text)
                    .await?;
            }
            ChallengeProvider::Sms => {
                let number = match (&account.phone, account.phone_confirmed) {
                    (Some(number), true) => number.clone(),
                    _ => {
                        return Err(ServiceError::InvalidArguments(
                            "No confirmed phone number on the account".to_string(),
                        ))
                    }
                };
                self.sms.send_sms(&number, &text).await?;
            }
        }
        Ok(())
    }

    /// Verify a one-time code and finish signing in.
    pub async fn verify_code(&self, req: VerifyCodeRequest) -> Result<SignInStatus, ServiceError> {
        req.validate()?;

        match self.challenges.verify(req.session_token, &req.code) {
            ChallengeOutcome::Success {
                account_id,
                remember_me,
            } => {
                let account = self
                    .accounts
                    .find_by_id(account_id)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                if req.remember_device {
                    if let Some(device_id) = req.device_id.as_deref() {
                        self.devices.remember(
                            account_id,
                            device_id,
                            self.challenges.remember_device_ttl(),
                        );
                    }
                }
                self.sessions.sign_in(&account, remember_me).await?;
                tracing::info!(account_id = %account_id, "Two-factor sign-in completed");
                Ok(SignInStatus::Success)
            }
            ChallengeOutcome::LockedOut { account_id } => {
                self.verifier.lock_out(account_id).await?;
                Ok(SignInStatus::LockedOut)
            }
            ChallengeOutcome::Failure => Ok(SignInStatus::Failure),
        }
    }

    pub async fn sign_out(&self, principal: &Principal) -> Result<(), ServiceError> {
        self.sessions.sign_out(principal.account_id).await
    }

    // ---- registration ----------------------------------------------------

    /// Register a new account and sign it in immediately. The account stays
    /// unconfirmed until the emailed token is redeemed; confirmation only
    /// gates specific flows, never sign-in itself.
    pub async fn register(&self, req: RegisterRequest) -> Result<Account, ServiceError> {
        req.validate()?;
        self.check_password_policy(&req.password)?;

        if self.accounts.email_in_use(&req.email).await? {
            return Err(ServiceError::EmailAlreadyUsed);
        }

        let hash = hash_password(&Password::new(req.password.clone()))?;
        let mut account =
            Account::new(req.email.clone()).with_password_hash(hash.into_string());
        account.first_name = req.first_name;
        account.last_name = req.last_name;
        account.client_id = req.client_id;

        self.accounts.create(&account).await.map_err(|e| match e {
            StoreError::Duplicate => ServiceError::EmailAlreadyUsed,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(account_id = %account.account_id, "Account registered");

        self.sessions.sign_in(&account, false).await?;
        self.issue_confirmation_email(&account).await;

        Ok(account)
    }

    /// Redeem an email-confirmation token. Single use.
    pub async fn confirm_email(&self, account_id: Uuid, token: &str) -> Result<(), ServiceError> {
        let redeemed = self
            .tokens
            .redeem(
                account_id,
                TokenPurpose::EmailConfirmation,
                &token_digest(token),
                Utc::now(),
            )
            .await?;
        if redeemed.is_none() {
            return Err(ServiceError::InvalidToken);
        }

        self.update_account(account_id, |account| {
            account.email_confirmed = true;
        })
        .await?;
        tracing::info!(account_id = %account_id, "Email confirmed");
        Ok(())
    }

    // ---- password reset --------------------------------------------------

    /// Start a password reset. Always succeeds from the caller's point of
    /// view, whether or not the email maps to an eligible account.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<(), ServiceError> {
        req.validate()?;

        let account = match self.accounts.find_by_email(&req.email).await? {
            Some(account) if account.email_confirmed => account,
            // Don't reveal that the account does not exist or is unconfirmed.
            _ => return Ok(()),
        };

        let raw = generate_token();
        let token = SecurityToken::new(
            account.account_id,
            TokenPurpose::PasswordReset,
            token_digest(&raw),
            Duration::minutes(self.config.tokens.reset_ttl_minutes),
        );
        self.tokens.insert(&token).await?;

        let link = format!(
            "{}/account/reset-password?email={}&code={}",
            self.config.public_base_url, account.email, raw
        );
        let body = format!(
            "We received a request to reset your password.\n\n\
             Please visit the following link to set a new password:\n\n{}\n\n\
             If you didn't request this, please ignore this email.",
            link
        );
        if let Err(e) = self
            .email
            .send_email(&account.email, "Reset Password", &body)
            .await
        {
            self.record_failure("forgot_password/send_email", &e).await;
        }

        tracing::info!(account_id = %account.account_id, "Password reset requested");
        Ok(())
    }

    /// Redeem a reset token and install a new password. The token is
    /// strictly single use; a successful reset also closes any lockout.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), ServiceError> {
        req.validate()?;

        let account = match self.accounts.find_by_email(&req.email).await? {
            Some(account) => account,
            // Don't reveal that the account does not exist.
            None => return Ok(()),
        };

        self.check_password_policy(&req.password)?;

        let redeemed = self
            .tokens
            .redeem(
                account.account_id,
                TokenPurpose::PasswordReset,
                &token_digest(&req.token),
                Utc::now(),
            )
            .await?;
        if redeemed.is_none() {
            return Err(ServiceError::InvalidToken);
        }

        let hash = hash_password(&Password::new(req.password.clone()))?;
        self.update_account(account.account_id, |account| {
            account.password_hash = Some(hash.as_str().to_string());
            account.reset_access_failures();
        })
        .await?;

        tracing::info!(account_id = %account.account_id, "Password reset completed");
        Ok(())
    }

    // ---- password management --------------------------------------------

    pub async fn change_password(
        &self,
        principal: &Principal,
        req: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;

        let account = self.load_account(principal.account_id).await?;
        let current_hash = account
            .password_hash
            .clone()
            .ok_or(ServiceError::IncorrectPassword)?;
        if !verify_password(
            &Password::new(req.old_password.clone()),
            &PasswordHashString::new(current_hash),
        ) {
            return Err(ServiceError::IncorrectPassword);
        }

        self.check_password_policy(&req.new_password)?;
        let hash = hash_password(&Password::new(req.new_password.clone()))?;
        let account = self
            .update_account(account.account_id, |account| {
                account.password_hash = Some(hash.as_str().to_string());
            })
            .await?;

        self.sessions.sign_in(&account, false).await?;
        tracing::info!(account_id = %account.account_id, "Password changed");
        Ok(())
    }

    /// Attach a password to an account that has none (external-login-only
    /// accounts).
    pub async fn set_password(
        &self,
        principal: &Principal,
        req: SetPasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;

        let account = self.load_account(principal.account_id).await?;
        if account.has_password() {
            return Err(ServiceError::UserAlreadyHasPassword);
        }

        self.check_password_policy(&req.new_password)?;
        let hash = hash_password(&Password::new(req.new_password.clone()))?;
        let account = self
            .update_account(account.account_id, |account| {
                account.password_hash = Some(hash.as_str().to_string());
            })
            .await?;

        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    // ---- external logins -------------------------------------------------

    /// Complete an external-provider handshake. Signs in directly when the
    /// assertion matches a known login.
    pub async fn external_sign_in(
        &self,
        assertion: &ExternalAssertion,
    ) -> Result<ExternalSignInStatus, ServiceError> {
        let login = match self
            .logins
            .find(&assertion.provider, &assertion.provider_key)
            .await?
        {
            Some(login) => login,
            None => return Ok(ExternalSignInStatus::RequiresConfirmation),
        };

        let account = self.load_account(login.account_id).await?;
        if account.is_locked_out(Utc::now()) {
            return Ok(ExternalSignInStatus::LockedOut);
        }

        self.sessions.sign_in(&account, false).await?;
        tracing::info!(
            account_id = %account.account_id,
            provider = %assertion.provider,
            "External sign-in"
        );
        Ok(ExternalSignInStatus::Success)
    }

    /// Confirmation step for a first-time external sign-in: claim an email,
    /// create the account and the login link, then sign in.
    pub async fn confirm_external(
        &self,
        assertion: &ExternalAssertion,
        req: ExternalConfirmationRequest,
    ) -> Result<Account, ServiceError> {
        req.validate()?;

        if self
            .logins
            .find(&assertion.provider, &assertion.provider_key)
            .await?
            .is_some()
        {
            return Err(ServiceError::LoginAlreadyAssociated);
        }
        if self.accounts.email_in_use(&req.email).await? {
            return Err(ServiceError::EmailAlreadyUsed);
        }

        let mut account = Account::new(req.email.clone());
        account.first_name = req.first_name;
        account.last_name = req.last_name;
        self.accounts.create(&account).await.map_err(|e| match e {
            StoreError::Duplicate => ServiceError::EmailAlreadyUsed,
            other => ServiceError::Store(other),
        })?;

        let login = ExternalLogin::new(
            assertion.provider.clone(),
            assertion.provider_key.clone(),
            account.account_id,
        );
        self.logins.add(&login).await.map_err(|e| match e {
            StoreError::Duplicate => ServiceError::LoginAlreadyAssociated,
            other => ServiceError::Store(other),
        })?;

        self.sessions.sign_in(&account, false).await?;
        self.issue_confirmation_email(&account).await;
        tracing::info!(
            account_id = %account.account_id,
            provider = %assertion.provider,
            "Account created from external login"
        );
        Ok(account)
    }

    /// Link an additional external login to the signed-in account.
    pub async fn link_login(
        &self,
        principal: &Principal,
        assertion: &ExternalAssertion,
    ) -> Result<(), ServiceError> {
        let login = ExternalLogin::new(
            assertion.provider.clone(),
            assertion.provider_key.clone(),
            principal.account_id,
        );
        self.logins.add(&login).await.map_err(|e| match e {
            StoreError::Duplicate => ServiceError::LoginAlreadyAssociated,
            other => ServiceError::Store(other),
        })
    }

    /// Remove an external login, refusing to strand the account without
    /// any sign-in method.
    pub async fn remove_login(
        &self,
        principal: &Principal,
        provider: &str,
        provider_key: &str,
    ) -> Result<(), ServiceError> {
        let account = self.load_account(principal.account_id).await?;
        let logins = self.logins.for_account(account.account_id).await?;

        let keeps_other_method = account.has_password()
            || logins
                .iter()
                .any(|l| !(l.provider == provider && l.provider_key == provider_key));
        if !keeps_other_method {
            return Err(ServiceError::RemoveLoginError);
        }

        let removed = self
            .logins
            .remove(account.account_id, provider, provider_key)
            .await?;
        if !removed {
            return Err(ServiceError::RemoveLoginError);
        }

        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    // ---- two-factor and phone management --------------------------------

    pub async fn enable_two_factor(&self, principal: &Principal) -> Result<(), ServiceError> {
        let account = self
            .update_account(principal.account_id, |account| {
                account.two_factor_enabled = true;
            })
            .await?;
        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    pub async fn disable_two_factor(&self, principal: &Principal) -> Result<(), ServiceError> {
        let account = self
            .update_account(principal.account_id, |account| {
                account.two_factor_enabled = false;
            })
            .await?;
        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    /// Issue a phone-confirmation code, delivered over SMS to the number
    /// being added.
    pub async fn add_phone_number(
        &self,
        principal: &Principal,
        req: AddPhoneRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;

        let code = generate_numeric_code(self.config.challenge.code_length);
        let token = SecurityToken::new(
            principal.account_id,
            TokenPurpose::PhoneConfirmation,
            token_digest(&code),
            Duration::minutes(self.config.tokens.phone_code_ttl_minutes),
        )
        .with_payload(req.number.clone());
        self.tokens.insert(&token).await?;

        let text = format!("Your security code is: {}", code);
        self.sms.send_sms(&req.number, &text).await?;
        Ok(())
    }

    /// Redeem a phone-confirmation code and attach the confirmed number.
    pub async fn verify_phone_number(
        &self,
        principal: &Principal,
        req: VerifyPhoneRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;

        let redeemed = self
            .tokens
            .redeem(
                principal.account_id,
                TokenPurpose::PhoneConfirmation,
                &token_digest(&req.code),
                Utc::now(),
            )
            .await?;
        let token = redeemed.ok_or_else(|| {
            ServiceError::InvalidArguments("Failed to verify phone number".to_string())
        })?;
        if token.payload.as_deref() != Some(req.number.as_str()) {
            return Err(ServiceError::InvalidArguments(
                "Failed to verify phone number".to_string(),
            ));
        }

        let account = self
            .update_account(principal.account_id, |account| {
                account.phone = Some(req.number.clone());
                account.phone_confirmed = true;
            })
            .await?;
        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    pub async fn remove_phone_number(&self, principal: &Principal) -> Result<(), ServiceError> {
        let account = self
            .update_account(principal.account_id, |account| {
                account.phone = None;
                account.phone_confirmed = false;
            })
            .await?;
        self.sessions.sign_in(&account, false).await?;
        Ok(())
    }

    /// Management view of the caller's own sign-in methods.
    pub async fn account_summary(
        &self,
        principal: &Principal,
    ) -> Result<AccountSummary, ServiceError> {
        let account = self.load_account(principal.account_id).await?;
        let logins = self.logins.for_account(account.account_id).await?;
        let remembered_devices = self.devices.for_account(account.account_id);
        Ok(AccountSummary {
            account_id: account.account_id,
            email: account.email,
            email_confirmed: account.email_confirmed,
            has_password: account.password_hash.is_some(),
            phone: account.phone,
            phone_confirmed: account.phone_confirmed,
            two_factor_enabled: account.two_factor_enabled,
            logins,
            remembered_devices,
        })
    }

    // ---- internals -------------------------------------------------------

    fn check_password_policy(&self, password: &str) -> Result<(), ServiceError> {
        let violations = validate_password(password, &self.config.password_policy);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::PasswordPolicy(violations))
        }
    }

    async fn load_account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| ServiceError::Store(StoreError::NotFound))
    }

    /// Reload-and-retry loop around the optimistic store update.
    async fn update_account<F>(
        &self,
        account_id: Uuid,
        mut mutate: F,
    ) -> Result<Account, ServiceError>
    where
        F: FnMut(&mut Account),
    {
        let mut account = self.load_account(account_id).await?;
        for _ in 0..MAX_UPDATE_RETRIES {
            mutate(&mut account);
            match self.accounts.update(&mut account).await {
                Ok(()) => return Ok(account),
                Err(StoreError::Conflict) => {
                    account = self.load_account(account_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::Store(StoreError::Conflict))
    }

    /// Issue an email-confirmation token and request delivery. Delivery
    /// failure is recorded but never fails the calling flow.
    async fn issue_confirmation_email(&self, account: &Account) {
        let raw = generate_token();
        let token = SecurityToken::new(
            account.account_id,
            TokenPurpose::EmailConfirmation,
            token_digest(&raw),
            Duration::hours(self.config.tokens.confirmation_ttl_hours),
        );
        if let Err(e) = self.tokens.insert(&token).await {
            self.record_failure("register/store_confirmation_token", &ServiceError::Store(e))
                .await;
            return;
        }

        let link = format!(
            "{}/account/confirm-email?user={}&code={}",
            self.config.public_base_url, account.account_id, raw
        );
        let body = format!(
            "Please confirm your account by visiting the following link:\n\n{}",
            link
        );
        if let Err(e) = self
            .email
            .send_email(&account.email, "Confirm your account", &body)
            .await
        {
            self.record_failure("register/send_confirmation", &e).await;
        }
    }

    /// Record an infrastructure failure to the operational log; logging
    /// must never cascade into the calling flow.
    async fn record_failure(&self, source: &str, error: &ServiceError) {
        tracing::error!(source = source, error = %error, "Operation failure recorded");
        let record = ErrorRecord::new(source, error.to_string());
        if let Err(log_err) = self.error_log.append(&record).await {
            tracing::error!(error = %log_err, "Failed to append to the error log");
        }
    }
}
