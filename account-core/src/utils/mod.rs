pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use token::{digest_matches, generate_numeric_code, generate_token, token_digest};
