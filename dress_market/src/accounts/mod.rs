//! Accounts module: the marketplace's view of a user.
//!
//! Credentials and token issuance live with an external identity provider
//! (see [`crate::identity`]); accounts here carry the profile, trust score
//! and balances.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AccountError, AccountResult};
pub use manager::AccountManager;
pub use models::{MAX_TRUST_SCORE, NewUser, User, UserId, UserProfile};
