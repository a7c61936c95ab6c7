pub mod account;
pub mod client;
pub mod error_record;
pub mod external_login;
pub mod role;
pub mod security_token;
pub mod two_factor;

pub use account::{Account, AccountSummary};
pub use client::Client;
pub use error_record::ErrorRecord;
pub use external_login::{ExternalAssertion, ExternalLogin};
pub use role::{Principal, Role};
pub use security_token::{SecurityToken, TokenPurpose};
pub use two_factor::{ChallengeProvider, PendingTwoFactorSession, RememberedDevice};
