pub mod account;
pub mod actions;
pub mod challenge;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod notify;
pub mod policy;
pub mod session;
pub mod status;

pub use account::{AccountService, ExternalSignInStatus, SignInStatus};
pub use actions::{
    ActionCatalog, ActionDescription, ActionProvider, ActionTarget, Actionable, EntityKind,
    GenericDetailActionProvider, GenericEditActionProvider,
};
pub use challenge::{ChallengeManager, ChallengeOutcome, RememberedDevices};
pub use credentials::{CredentialVerifier, Verification};
pub use directory::{managed_roles, sanitize_roles, AccountDirectory};
pub use error::ServiceError;
pub use notify::{EmailSender, EmptySmsSender, MockEmailSender, SmsSender, SmtpEmailSender};
pub use policy::{validate_password, PasswordViolation};
pub use session::{NullSessionIssuer, SessionIssuer};
pub use status::{ApiStatus, StatusResponse};
