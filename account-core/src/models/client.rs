//! Client model - the organization an account may be scoped to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client entity.
///
/// Clients are usually the company paying for the service; accounts carry
/// an optional reference to one and visibility rules partition by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: Uuid,
    pub company_name: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Client {
    pub fn new(company_name: String) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            company_name,
            contact_person: None,
            contact_email: None,
            contact_phone: None,
            notes: None,
            created_utc: Utc::now(),
        }
    }
}
