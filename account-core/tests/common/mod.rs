#![allow(dead_code)]

use account_core::config::{
    ChallengeConfig, CoreConfig, Environment, LockoutConfig, PasswordPolicy, SmtpConfig,
    TokenConfig,
};
use account_core::models::Account;
use account_core::services::{
    AccountService, EmailSender, ServiceError, SessionIssuer, SmsSender,
};
use account_core::store::postgres::DatabaseConfig;
use account_core::store::MemoryStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email sender that records every message for assertions.
#[derive(Default)]
pub struct RecordingMailbox {
    pub messages: Mutex<Vec<SentEmail>>,
}

impl RecordingMailbox {
    pub fn last_for(&self, to: &str) -> Option<SentEmail> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailSender for RecordingMailbox {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ServiceError> {
        self.messages.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentSms {
    pub number: String,
    pub text: String,
}

/// SMS sender that records every message for assertions.
#[derive(Default)]
pub struct RecordingSmsOutbox {
    pub messages: Mutex<Vec<SentSms>>,
}

impl RecordingSmsOutbox {
    pub fn last_for(&self, number: &str) -> Option<SentSms> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.number == number)
            .cloned()
    }
}

#[async_trait]
impl SmsSender for RecordingSmsOutbox {
    async fn send_sms(&self, number: &str, text: &str) -> Result<(), ServiceError> {
        self.messages.lock().unwrap().push(SentSms {
            number: number.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Session issuer that records sign-in/out transitions.
#[derive(Default)]
pub struct RecordingSessions {
    pub signed_in: Mutex<Vec<Uuid>>,
    pub signed_out: Mutex<Vec<Uuid>>,
}

impl RecordingSessions {
    pub fn sign_in_count(&self) -> usize {
        self.signed_in.lock().unwrap().len()
    }

    pub fn last_signed_in(&self) -> Option<Uuid> {
        self.signed_in.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl SessionIssuer for RecordingSessions {
    async fn sign_in(&self, account: &Account, _persistent: bool) -> Result<(), ServiceError> {
        self.signed_in.lock().unwrap().push(account.account_id);
        Ok(())
    }

    async fn sign_out(&self, account_id: Uuid) -> Result<(), ServiceError> {
        self.signed_out.lock().unwrap().push(account_id);
        Ok(())
    }
}

/// Deterministic config for tests; smaller budgets than the defaults to
/// keep the lockout tests short.
pub fn test_config() -> CoreConfig {
    CoreConfig {
        environment: Environment::Dev,
        service_name: "account-core-tests".to_string(),
        log_level: "debug".to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "no-reply@localhost".to_string(),
        },
        lockout: LockoutConfig {
            max_failed_attempts: 3,
            lockout_minutes: 15,
        },
        challenge: ChallengeConfig {
            code_length: 6,
            session_ttl_minutes: 5,
            max_attempts: 3,
            remember_device_days: 30,
        },
        tokens: TokenConfig {
            reset_ttl_minutes: 60,
            confirmation_ttl_hours: 24,
            phone_code_ttl_minutes: 10,
        },
        password_policy: PasswordPolicy::default(),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub mailbox: Arc<RecordingMailbox>,
    pub sms: Arc<RecordingSmsOutbox>,
    pub sessions: Arc<RecordingSessions>,
    pub service: AccountService,
}

/// Build an account service wired to the in-memory store and recording
/// collaborators.
pub fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let mailbox = Arc::new(RecordingMailbox::default());
    let sms = Arc::new(RecordingSmsOutbox::default());
    let sessions = Arc::new(RecordingSessions::default());

    let service = AccountService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        mailbox.clone(),
        sms.clone(),
        sessions.clone(),
        test_config(),
    );

    Harness {
        store,
        mailbox,
        sms,
        sessions,
        service,
    }
}

/// Pull a query parameter value out of a link embedded in a message body.
pub fn extract_param(body: &str, name: &str) -> Option<String> {
    let marker = format!("{}=", name);
    let start = body.find(&marker)? + marker.len();
    let value: String = body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    Some(value)
}

/// Pull a short numeric code out of a "Your security code is: NNNNNN"
/// message.
pub fn extract_code(text: &str) -> Option<String> {
    let start = text.find(": ")? + 2;
    let code: String = text[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}
