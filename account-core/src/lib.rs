//! Reusable identity and account-management core.
//!
//! The crate implements the account lifecycle state machine (sign-in with
//! lockout, two-factor challenges, registration, password reset,
//! external-login linking) and the role-scoped authorization rules around
//! it. Persistence, outbound notification and session issuance are
//! consumed through traits; an in-memory store and a PostgreSQL store are
//! provided.
//!
//! Every operation resolves to the fixed [`services::ApiStatus`]
//! vocabulary at the boundary; internal error detail never crosses it.

pub mod config;
pub mod dtos;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;
