use chrono::{DateTime, Utc};

use super::password::Credential;

/// What the auth core needs to know about an account record.
pub trait Principal {
    fn id(&self) -> u64;

    fn credential(&self) -> &Credential;

    /// Last mutation of the account. Reset tokens issued before this instant
    /// are no longer honoured.
    fn updated_at(&self) -> DateTime<Utc>;
}
