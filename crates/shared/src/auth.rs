//! Authorization context supplied to every ledger and loan operation.
//!
//! Token issuance and validation happen outside this system; by the time a
//! request reaches the core, the caller has been authenticated and only
//! their identity is passed along.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// The authenticated user.
    pub user_id: UserId,
}

impl Caller {
    /// Creates a caller for the given user.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    /// Returns true if this caller is the given owner.
    #[must_use]
    pub fn owns(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}

impl From<UserId> for Caller {
    fn from(user_id: UserId) -> Self {
        Self::new(user_id)
    }
}
