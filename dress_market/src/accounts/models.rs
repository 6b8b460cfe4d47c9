//! Account data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Balances;

/// User ID type
pub type UserId = i64;

/// Highest trust score a user can hold
pub const MAX_TRUST_SCORE: i16 = 100;

/// Marketplace user. Identity and credentials live with the external
/// identity provider; this is the marketplace's view of the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub trust_score: i16,
    #[serde(flatten)]
    pub balances: Balances,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What other users see of an account: no email, no balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub trust_score: i16,
    pub avatar: Option<String>,
    /// Listings currently on the market
    pub live_listings: usize,
    pub member_since: DateTime<Utc>,
}

/// Profile for a user about to be created. Accounts always start with empty
/// balances; funds arrive through a ledger top-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub trust_score: i16,
    pub avatar: Option<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            trust_score: MAX_TRUST_SCORE,
            avatar: None,
        }
    }

    pub fn with_trust_score(mut self, trust_score: i16) -> Self {
        self.trust_score = trust_score;
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Check the profile shape, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("invalid email address {:?}", self.email));
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if !(0..=MAX_TRUST_SCORE).contains(&self.trust_score) {
            return Err(format!(
                "trust score must be between 0 and {MAX_TRUST_SCORE}, got {}",
                self.trust_score
            ));
        }
        Ok(())
    }
}
