//! Public profile record mirrored by the read-through cache.

use chrono::{DateTime, Utc};

use super::{AccountId, DisplayAttributes, Username};

/// Profile record owned by the profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub account_id: AccountId,
    pub username: Username,
    pub display_attributes: DisplayAttributes,
    pub created_at: DateTime<Utc>,
}
